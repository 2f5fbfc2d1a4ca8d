//! # Routes and waypoints
//!
//! A [`Route`] is an ordered list of [`Waypoint`]s. Waypoints carry optional
//! goals, a point with no position can still command a heading, altitude or
//! speed change. Labels and gotos allow loops and jumps within a route.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::computer::SwitchMode;
use crate::constraints::PathConstraints;
use crate::target::TurnDirection;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A per-waypoint override of one constraint value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintOverride {
    /// Keep whatever value was in force at the previous waypoint.
    UsePrevious,
    /// Restore the driver's default value.
    UseDefault,
    /// Use this value from here on.
    Value(f64),
}

impl Default for ConstraintOverride {
    fn default() -> Self {
        ConstraintOverride::UsePrevious
    }
}

impl ConstraintOverride {
    fn apply(&self, current: &mut f64, default: f64) {
        match self {
            ConstraintOverride::UsePrevious => (),
            ConstraintOverride::UseDefault => *current = default,
            ConstraintOverride::Value(v) => *current = *v,
        }
    }
}

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Constraint overrides carried by a waypoint.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WaypointConstraints {
    pub max_linear_accel_ms2: ConstraintOverride,
    pub max_radial_accel_ms2: ConstraintOverride,
    pub max_climb_rate_ms: ConstraintOverride,
    pub max_flight_path_angle_rad: ConstraintOverride,
    pub max_speed_ms: ConstraintOverride,
    pub min_speed_ms: ConstraintOverride,
    pub turn_rate_limit_rads: ConstraintOverride,
}

impl WaypointConstraints {
    /// Apply these overrides on top of `current`, with `defaults` as the
    /// values restored by `UseDefault`.
    pub fn apply(&self, current: &mut PathConstraints, defaults: &PathConstraints) {
        self.max_linear_accel_ms2
            .apply(&mut current.max_linear_accel_ms2, defaults.max_linear_accel_ms2);
        self.max_radial_accel_ms2
            .apply(&mut current.max_radial_accel_ms2, defaults.max_radial_accel_ms2);
        self.max_climb_rate_ms
            .apply(&mut current.max_climb_rate_ms, defaults.max_climb_rate_ms);
        self.max_flight_path_angle_rad.apply(
            &mut current.max_flight_path_angle_rad,
            defaults.max_flight_path_angle_rad,
        );
        self.max_speed_ms
            .apply(&mut current.max_speed_ms, defaults.max_speed_ms);
        self.min_speed_ms
            .apply(&mut current.min_speed_ms, defaults.min_speed_ms);
        self.turn_rate_limit_rads
            .apply(&mut current.turn_rate_limit_rads, defaults.turn_rate_limit_rads);
    }
}

/// A single point (or goal change) along a route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Waypoint {
    /// Optional label, the target of `goto` jumps.
    pub label: Option<String>,

    /// Label of the waypoint to jump to after reaching this one.
    pub goto: Option<String>,

    /// Geodetic position `(lat_deg, lon_deg)`.
    pub position: Option<(f64, f64)>,

    pub altitude_m: Option<f64>,
    pub speed_ms: Option<f64>,

    /// Heading goal, only meaningful when `position` is `None`.
    pub heading_rad: Option<f64>,
    pub relative_heading: bool,

    /// Ground distance to fly for this leg, only meaningful when `position`
    /// is `None`.
    pub distance_m: Option<f64>,

    /// Required arrival time at this point, measured from leg start.
    pub time_to_point_s: Option<f64>,

    /// Time to hold at this point before continuing.
    pub pause_time_s: Option<f64>,

    pub turn_direction: TurnDirection,

    /// Per-waypoint switch behaviour, `None` uses the driver's default.
    pub switch_mode: Option<SwitchMode>,

    /// Radial acceleration for the approach turn onto this point's leg.
    pub radial_accel_ms2: Option<f64>,

    /// `Some(true)` marks a required point, `Some(false)` an optional one.
    pub required: Option<bool>,

    pub constraints: WaypointConstraints,
}

impl Default for Waypoint {
    fn default() -> Self {
        Self {
            label: None,
            goto: None,
            position: None,
            altitude_m: None,
            speed_ms: None,
            heading_rad: None,
            relative_heading: false,
            distance_m: None,
            time_to_point_s: None,
            pause_time_s: None,
            turn_direction: TurnDirection::Shortest,
            switch_mode: None,
            radial_accel_ms2: None,
            required: None,
            constraints: WaypointConstraints::default(),
        }
    }
}

impl Waypoint {
    /// A plain position waypoint.
    pub fn at(lat_deg: f64, lon_deg: f64) -> Self {
        Self {
            position: Some((lat_deg, lon_deg)),
            ..Default::default()
        }
    }

    /// Position waypoint with an altitude and speed goal.
    pub fn at_with(lat_deg: f64, lon_deg: f64, altitude_m: f64, speed_ms: f64) -> Self {
        Self {
            position: Some((lat_deg, lon_deg)),
            altitude_m: Some(altitude_m),
            speed_ms: Some(speed_ms),
            ..Default::default()
        }
    }
}

/// An ordered list of waypoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Route {
    pub waypoints: Vec<Waypoint>,
}

impl Route {
    pub fn new(waypoints: Vec<Waypoint>) -> Self {
        Self { waypoints }
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn get(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    /// Index of the waypoint carrying the given label.
    pub fn index_of_label(&self, label: &str) -> Option<usize> {
        self.waypoints
            .iter()
            .position(|w| w.label.as_deref() == Some(label))
    }

    /// Index of the waypoint flown after `index`, resolving any goto jump.
    /// `None` when the route is exhausted or the goto label is unknown.
    pub fn next_index(&self, index: usize) -> Option<usize> {
        let waypoint = self.waypoints.get(index)?;
        match &waypoint.goto {
            Some(label) => self.index_of_label(label),
            None => {
                let next = index + 1;
                if next < self.waypoints.len() {
                    Some(next)
                } else {
                    None
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::constraints::LARGE_DOUBLE;

    #[test]
    fn test_next_index_walks_forward() {
        let route = Route::new(vec![Waypoint::at(0.0, 0.0), Waypoint::at(0.0, 1.0)]);
        assert_eq!(route.next_index(0), Some(1));
        assert_eq!(route.next_index(1), None);
    }

    #[test]
    fn test_goto_loops_back() {
        let mut first = Waypoint::at(0.0, 0.0);
        first.label = Some("start".to_string());
        let mut last = Waypoint::at(0.0, 1.0);
        last.goto = Some("start".to_string());

        let route = Route::new(vec![first, last]);
        assert_eq!(route.next_index(1), Some(0));
    }

    #[test]
    fn test_unknown_goto_ends_route() {
        let mut only = Waypoint::at(0.0, 0.0);
        only.goto = Some("nowhere".to_string());
        let route = Route::new(vec![only]);
        assert_eq!(route.next_index(0), None);
    }

    #[test]
    fn test_constraint_overrides() {
        let defaults = PathConstraints::default();
        let mut current = PathConstraints {
            max_climb_rate_ms: 5.0,
            max_linear_accel_ms2: 2.0,
            ..Default::default()
        };

        let overrides = WaypointConstraints {
            max_climb_rate_ms: ConstraintOverride::Value(10.0),
            max_linear_accel_ms2: ConstraintOverride::UseDefault,
            ..Default::default()
        };
        overrides.apply(&mut current, &defaults);

        assert_eq!(current.max_climb_rate_ms, 10.0);
        assert_eq!(current.max_linear_accel_ms2, LARGE_DOUBLE);
        // Untouched fields keep their previous values
        assert_eq!(current.max_speed_ms, defaults.max_speed_ms);
    }
}
