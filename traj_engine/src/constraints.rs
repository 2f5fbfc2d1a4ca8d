//! # Path constraints
//!
//! Kinematic limits applied while generating trajectories. Unlimited values
//! are represented by [`LARGE_DOUBLE`] rather than infinity so that arithmetic
//! on them stays finite, [`is_limited`] tells the two apart.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::geo::{EARTH_RADIUS_M, STANDARD_GRAVITY_MS2};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Stand-in for an unlimited value. Large enough to dominate any physical
/// quantity, small enough that products of two of them stay finite.
pub const LARGE_DOUBLE: f64 = 1.0e12;

/// Accelerations below this are treated as zero.
pub const MIN_ACCELERATION: f64 = 1.0e-7;

/// Speeds below this are treated as zero.
pub const MIN_SPEED: f64 = 1.0e-7;

/// Upper bound on any turn radius. Beyond roughly half the earth radius the
/// tangent circle construction stops making sense.
pub const MAXIMUM_TURN_RADIUS: f64 = 0.47 * EARTH_RADIUS_M;

/// Radial acceleration used while constrained to the ground, effectively
/// allowing turns in place.
pub const GROUND_RADIAL_ACCEL: f64 = 1.0e9;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// True if a value represents an actual limit rather than "unlimited".
pub fn is_limited(value: f64) -> bool {
    value.abs() < 0.5 * LARGE_DOUBLE
}

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Kinematic limits for trajectory generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConstraints {
    /// Maximum linear (along-track) acceleration in m/s^2.
    pub max_linear_accel_ms2: f64,

    /// Maximum radial (turning) acceleration in m/s^2.
    pub max_radial_accel_ms2: f64,

    /// Maximum climb (or descent) rate in m/s.
    pub max_climb_rate_ms: f64,

    /// Maximum flight path angle in radians.
    pub max_flight_path_angle_rad: f64,

    /// Altitude bounds in metres.
    pub max_altitude_m: f64,
    pub min_altitude_m: f64,

    /// Speed bounds in m/s.
    pub max_speed_ms: f64,
    pub min_speed_ms: f64,

    /// Maximum turn rate in rad/s.
    pub max_turn_rate_rads: f64,

    /// Explicit turn rate used for turning, overrides the radius implied by
    /// radial acceleration when more restrictive.
    pub turn_rate_limit_rads: f64,

    /// Maximum load factor normal to the body, in units of g. Only limits
    /// the turn radius when above 1 g.
    pub body_vert_limit_g: f64,

    /// Maximum roll rate in rad/s.
    pub roll_rate_limit_rads: f64,

    /// Gain applied when pursuing a commanded heading.
    pub heading_pursuit_gain: f64,

    /// True when the craft is constrained to the ground surface.
    pub is_on_ground: bool,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Default for PathConstraints {
    fn default() -> Self {
        Self {
            max_linear_accel_ms2: LARGE_DOUBLE,
            max_radial_accel_ms2: LARGE_DOUBLE,
            max_climb_rate_ms: LARGE_DOUBLE,
            max_flight_path_angle_rad: LARGE_DOUBLE,
            max_altitude_m: LARGE_DOUBLE,
            min_altitude_m: -LARGE_DOUBLE,
            max_speed_ms: LARGE_DOUBLE,
            min_speed_ms: 0.0,
            max_turn_rate_rads: LARGE_DOUBLE,
            turn_rate_limit_rads: LARGE_DOUBLE,
            body_vert_limit_g: 0.0,
            roll_rate_limit_rads: LARGE_DOUBLE,
            heading_pursuit_gain: 5.0,
            is_on_ground: false,
        }
    }
}

impl PathConstraints {
    /// Turn radius at the given speed, taking the most restrictive of the
    /// turn rate, radial acceleration and body load limits.
    pub fn turn_radius_m(&self, speed_ms: f64) -> f64 {
        let mut radius: f64 = 0.0;

        if is_limited(self.turn_rate_limit_rads) && self.turn_rate_limit_rads > 0.0 {
            radius = radius.max(speed_ms / self.turn_rate_limit_rads);
        }
        if is_limited(self.max_radial_accel_ms2) && self.max_radial_accel_ms2 > MIN_ACCELERATION {
            radius = radius.max(speed_ms * speed_ms / self.max_radial_accel_ms2);
        }
        if is_limited(self.max_turn_rate_rads) && self.max_turn_rate_rads > 0.0 {
            radius = radius.max(speed_ms / self.max_turn_rate_rads);
        }
        if self.body_vert_limit_g > 1.0 {
            let accel = self.body_vert_limit_g * STANDARD_GRAVITY_MS2;
            let radial = accel * (STANDARD_GRAVITY_MS2 / accel).acos().sin();
            if radial > MIN_ACCELERATION {
                radius = radius.max(speed_ms * speed_ms / radial);
            }
        }

        radius.min(MAXIMUM_TURN_RADIUS)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_turn_radius_radial_accel() {
        let constraints = PathConstraints {
            max_radial_accel_ms2: 9.8,
            ..Default::default()
        };
        // r = v^2 / a
        let radius = constraints.turn_radius_m(100.0);
        assert!((radius - 100.0 * 100.0 / 9.8).abs() < 1e-6);
    }

    #[test]
    fn test_turn_radius_clamped() {
        let constraints = PathConstraints {
            turn_rate_limit_rads: 1.0e-9,
            ..Default::default()
        };
        assert!((constraints.turn_radius_m(100.0) - MAXIMUM_TURN_RADIUS).abs() < 1e-6);
    }

    #[test]
    fn test_unconstrained_radius_is_zero() {
        let constraints = PathConstraints::default();
        assert_eq!(constraints.turn_radius_m(100.0), 0.0);
    }

}
