//! # Tangent circle turn solutions
//!
//! A turn is modelled as travel around a small circle on the sphere whose
//! centre (the "axis point") sits one turn radius abeam of the craft. The
//! departure point towards a target is found with a circle-point tangent
//! construction in the plane perpendicular to the axis.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector3;

use util::maths::normalize_two_pi;

use crate::geo;
use crate::state::KinematicState;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Below this triple product magnitude the target is on the current great
/// circle and no turn is needed.
const MIN_TURN_DISCRIMINANT: f64 = 1.0e-20;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Which way to turn to face a target, `Some(true)` for clockwise (right).
///
/// Uses the sign of `(velocity x location) . (target - location)`. Returns
/// `None` when the target lies on the current great circle, ahead or behind.
pub fn resolve_turn_direction(
    state: &KinematicState,
    target_wcs: &Vector3<f64>,
) -> Option<bool> {
    let location = state.position_wcs();
    let velocity = state.velocity_wcs();

    let discriminant = velocity.cross(&location).dot(&(target_wcs - location));
    if discriminant.abs() < MIN_TURN_DISCRIMINANT {
        None
    } else {
        Some(discriminant > 0.0)
    }
}

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Geometry of one candidate turn circle.
#[derive(Debug, Clone)]
pub struct TurnSolution {
    /// Direction from the earth centre to the turn circle centre, at the
    /// craft's distance from the centre.
    axis_point_wcs: Vector3<f64>,

    /// Local basis of the plane perpendicular to the axis (x north, y east,
    /// increasing polar angle is compass clockwise).
    northern: Vector3<f64>,
    eastern: Vector3<f64>,

    /// Turn radius measured along the surface.
    pub surface_radius_m: f64,

    /// Radius of the circle in the projected plane.
    pub planar_radius_m: f64,

    earth_radius_m: f64,
    clockwise: bool,

    location_wcs: Vector3<f64>,
    velocity_dir_wcs: Vector3<f64>,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl TurnSolution {
    /// Build the turn circle abeam the craft on the given side.
    pub fn new(state: &KinematicState, radius_m: f64, clockwise: bool) -> Self {
        let earth_radius_m = geo::earth_radius_at_altitude(state.altitude_m);
        let location_wcs = state.position_wcs();

        let velocity = state.velocity_wcs();
        let velocity_dir_wcs = if velocity.norm() > 1.0e-12 {
            velocity.normalize()
        } else {
            let heading = state.orientation_ned_rad.x;
            geo::ned_to_wcs_at(
                state.latitude_deg,
                state.longitude_deg,
                &Vector3::new(heading.cos(), heading.sin(), 0.0),
            )
        };

        // Rotating the position about the velocity axis by +angle swings it
        // to the right of track, so a clockwise turn centre uses +angle.
        let angle = radius_m / earth_radius_m;
        let signed = if clockwise { angle } else { -angle };
        let axis_point_wcs = geo::rotate_about(&location_wcs, &velocity_dir_wcs, signed);

        let (northern, eastern) = geo::perpendicular_basis(&axis_point_wcs);

        Self {
            axis_point_wcs,
            northern,
            eastern,
            surface_radius_m: radius_m,
            planar_radius_m: earth_radius_m * angle.sin(),
            earth_radius_m,
            clockwise,
            location_wcs,
            velocity_dir_wcs,
        }
    }

    pub fn is_clockwise(&self) -> bool {
        self.clockwise
    }

    /// Axis to rotate position and velocity about so that a positive angle
    /// carries the craft forward around the turn.
    pub fn segment_axis_wcs(&self) -> Vector3<f64> {
        if self.clockwise {
            -self.axis_point_wcs
        } else {
            self.axis_point_wcs
        }
    }

    /// Replace this solution with its mirror image on the other side of the
    /// craft.
    pub fn reverse(&mut self) {
        *self = TurnSolution::new_from_parts(
            &self.location_wcs,
            &self.velocity_dir_wcs,
            self.surface_radius_m,
            self.earth_radius_m,
            !self.clockwise,
        );
    }

    fn new_from_parts(
        location_wcs: &Vector3<f64>,
        velocity_dir_wcs: &Vector3<f64>,
        radius_m: f64,
        earth_radius_m: f64,
        clockwise: bool,
    ) -> Self {
        let angle = radius_m / earth_radius_m;
        let signed = if clockwise { angle } else { -angle };
        let axis_point_wcs = geo::rotate_about(location_wcs, velocity_dir_wcs, signed);
        let (northern, eastern) = geo::perpendicular_basis(&axis_point_wcs);

        Self {
            axis_point_wcs,
            northern,
            eastern,
            surface_radius_m: radius_m,
            planar_radius_m: earth_radius_m * angle.sin(),
            earth_radius_m,
            clockwise,
            location_wcs: *location_wcs,
            velocity_dir_wcs: *velocity_dir_wcs,
        }
    }

    /// Coordinates of a WCS point in the projected plane.
    fn planar(&self, wcs: &Vector3<f64>) -> (f64, f64) {
        (wcs.dot(&self.northern), wcs.dot(&self.eastern))
    }

    /// Polar angle of a WCS point in the projected plane.
    fn planar_angle(&self, wcs: &Vector3<f64>) -> f64 {
        let (x, y) = self.planar(wcs);
        y.atan2(x)
    }

    /// Normalize a raw angle difference into the turn's direction of travel,
    /// positive for clockwise turns, negative for counterclockwise.
    fn directed_angle(&self, raw: f64) -> f64 {
        if self.clockwise {
            if raw < 0.0 {
                normalize_two_pi(raw)
            } else {
                raw
            }
        } else if raw > 0.0 {
            -normalize_two_pi(-raw)
        } else {
            raw
        }
    }

    /// Angle to travel around the circle so that a tangent departure reaches
    /// the target. `None` when the target lies on or inside the circle.
    pub fn turn_angle_to_point(&self, target_wcs: &Vector3<f64>) -> Option<f64> {
        let (tx, ty) = self.planar(target_wcs);
        let (px, py) =
            geo::circle_point_tangent(self.planar_radius_m, tx, ty, self.clockwise)?;

        let start = self.planar_angle(&self.location_wcs);
        let departure = py.atan2(px);

        Some(self.directed_angle(departure - start))
    }

    /// Angle to the closest point of approach to the target, the fallback
    /// when no tangent departure exists.
    pub fn cpa_turn_angle(&self, target_wcs: &Vector3<f64>) -> f64 {
        let start = self.planar_angle(&self.location_wcs);
        let closest = self.planar_angle(target_wcs);
        self.directed_angle(closest - start)
    }

    /// How far inside the turn circle the target lies, zero when it is
    /// outside and a tangent solution exists.
    pub fn miss_distance_m(&self, target_wcs: &Vector3<f64>) -> f64 {
        let (x, y) = self.planar(target_wcs);
        (self.planar_radius_m - (x * x + y * y).sqrt()).max(0.0)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
