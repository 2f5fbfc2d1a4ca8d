//! # Trajectory segments
//!
//! Each segment is an analytic motion primitive: given the state at the start
//! of the segment and an elapsed time it produces the state at that time, with
//! no accumulated integration error. Segments always rotate the position
//! vector about a WCS axis, a turn uses an axis through the turn circle
//! centre, a straight leg uses the great circle axis so that "straight" means
//! straight over the curved earth.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::geo;
use crate::state::KinematicState;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A single analytic piece of a trajectory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Segment {
    /// Hold the start state for the duration.
    Pause { duration_s: f64 },

    /// Constant speed circular arc about `axis_wcs`.
    ///
    /// `rotation_radius_m` is the surface distance from the axis point, for a
    /// turn it is the turn radius, for a great circle leg the earth radius at
    /// altitude.
    Arc {
        duration_s: f64,
        axis_wcs: Vector3<f64>,
        rotation_radius_m: f64,
        speed_ms: f64,
        target_roll_rad: f64,
        roll_rate_rads: f64,
    },

    /// Great circle leg with linear acceleration and altitude change.
    Dynamics {
        duration_s: f64,
        axis_wcs: Vector3<f64>,
        rotation_radius_m: f64,
        linear_accel_ms2: f64,
        climb_rate_ms: f64,
        flight_angle_rad: f64,
        roll_rate_rads: f64,
        /// Set when this leg only approximates the limited dynamics, e.g.
        /// accelerating while still rolling out of a turn.
        is_approximation: bool,
    },
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Segment {
    pub fn duration_s(&self) -> f64 {
        match self {
            Segment::Pause { duration_s } => *duration_s,
            Segment::Arc { duration_s, .. } => *duration_s,
            Segment::Dynamics { duration_s, .. } => *duration_s,
        }
    }

    pub fn is_approximation(&self) -> bool {
        match self {
            Segment::Dynamics {
                is_approximation, ..
            } => *is_approximation,
            _ => false,
        }
    }

    /// State at `dt` seconds into this segment, given the state at its start.
    ///
    /// `dt <= 0` returns the start state unchanged, so sampling a segment
    /// boundary from either side gives bit-identical results.
    pub fn compute_state(&self, initial: &KinematicState, dt: f64) -> KinematicState {
        if dt <= 0.0 {
            return *initial;
        }

        match self {
            Segment::Pause { .. } => *initial,
            Segment::Arc {
                axis_wcs,
                rotation_radius_m,
                speed_ms,
                target_roll_rad,
                roll_rate_rads,
                ..
            } => compute_arc_state(
                initial,
                dt,
                axis_wcs,
                *rotation_radius_m,
                *speed_ms,
                *target_roll_rad,
                *roll_rate_rads,
            ),
            Segment::Dynamics {
                axis_wcs,
                rotation_radius_m,
                linear_accel_ms2,
                climb_rate_ms,
                flight_angle_rad,
                roll_rate_rads,
                ..
            } => compute_dynamics_state(
                initial,
                dt,
                axis_wcs,
                *rotation_radius_m,
                *linear_accel_ms2,
                *climb_rate_ms,
                *flight_angle_rad,
                *roll_rate_rads,
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Ramp `current` towards `target` at `rate` over `dt` without overshoot.
fn ramp(current: f64, target: f64, rate: f64, dt: f64) -> f64 {
    let step = (rate * dt).abs();
    let delta = target - current;
    if delta.abs() <= step {
        target
    } else {
        current + step * delta.signum()
    }
}

/// Velocity direction in WCS, falling back to the orientation heading when
/// the craft is stationary.
fn velocity_direction_wcs(state: &KinematicState) -> Vector3<f64> {
    let vel = state.velocity_wcs();
    if vel.norm() > 1.0e-12 {
        vel.normalize()
    } else {
        let heading = state.orientation_ned_rad.x;
        geo::ned_to_wcs_at(
            state.latitude_deg,
            state.longitude_deg,
            &Vector3::new(heading.cos(), heading.sin(), 0.0),
        )
    }
}

fn compute_arc_state(
    initial: &KinematicState,
    dt: f64,
    axis_wcs: &Vector3<f64>,
    rotation_radius_m: f64,
    speed_ms: f64,
    target_roll_rad: f64,
    roll_rate_rads: f64,
) -> KinematicState {
    let angle = speed_ms * dt / rotation_radius_m;

    let pos = initial.position_wcs();
    let vel = velocity_direction_wcs(initial) * speed_ms;

    let new_pos = geo::rotate_about(&pos, axis_wcs, angle);
    let new_vel = geo::rotate_about(&vel, axis_wcs, angle);

    let mut state = *initial;
    state.set_from_wcs(&new_pos, &new_vel);

    // Rotation about an axis through the earth centre preserves distance
    // from the centre, force the exact altitude to avoid drift.
    state.altitude_m = initial.altitude_m;

    // Centripetal acceleration from the angular rate about the axis
    let omega = axis_wcs.normalize() * (speed_ms / rotation_radius_m);
    let accel_wcs = omega.cross(&new_vel);
    state.acceleration_ned_ms2 =
        geo::wcs_to_ned_at(state.latitude_deg, state.longitude_deg, &accel_wcs);

    state.orientation_ned_rad.y = 0.0;
    state.orientation_ned_rad.z = ramp(
        initial.orientation_ned_rad.z,
        target_roll_rad,
        roll_rate_rads,
        dt,
    );

    state
}

fn compute_dynamics_state(
    initial: &KinematicState,
    dt: f64,
    axis_wcs: &Vector3<f64>,
    rotation_radius_m: f64,
    linear_accel_ms2: f64,
    climb_rate_ms: f64,
    flight_angle_rad: f64,
    roll_rate_rads: f64,
) -> KinematicState {
    let initial_speed = initial.speed_ms();

    // Do not decelerate through zero, the breakpoint planner ends the
    // segment at the stop time but the sampler must still be safe past it.
    let mut dt_eff = dt;
    if linear_accel_ms2 < 0.0 {
        let stop_time = -initial_speed / linear_accel_ms2;
        if dt_eff > stop_time {
            dt_eff = stop_time;
        }
    }

    let speed = initial_speed + linear_accel_ms2 * dt_eff;
    let dist = initial_speed * dt_eff + 0.5 * linear_accel_ms2 * dt_eff * dt_eff;

    let alt_change = climb_rate_ms * dt_eff + dist * flight_angle_rad.sin();
    let ground_dist = (dist * dist - alt_change * alt_change).max(0.0).sqrt();

    let angle = ground_dist / rotation_radius_m;

    let pos = initial.position_wcs();
    let vel_dir = velocity_direction_wcs(initial);

    let new_alt = initial.altitude_m + alt_change;
    let mut new_pos = geo::rotate_about(&pos, axis_wcs, angle);
    new_pos *= geo::earth_radius_at_altitude(new_alt) / new_pos.norm();

    // Heading comes from the rotated velocity direction
    let new_vel_dir = geo::rotate_about(&vel_dir, axis_wcs, angle);

    let mut state = *initial;
    state.set_from_wcs(&new_pos, &new_vel_dir);
    state.altitude_m = new_alt;

    let heading = state.orientation_ned_rad.x;
    let climb_speed = climb_rate_ms + speed * flight_angle_rad.sin();
    let horizontal_speed = (speed * speed - climb_speed * climb_speed).max(0.0).sqrt();

    state.velocity_ned_ms = Vector3::new(
        horizontal_speed * heading.cos(),
        horizontal_speed * heading.sin(),
        -climb_speed,
    );
    state.acceleration_ned_ms2 = Vector3::new(
        linear_accel_ms2 * heading.cos(),
        linear_accel_ms2 * heading.sin(),
        0.0,
    );

    state.orientation_ned_rad.y = if speed > 1.0e-12 {
        (climb_speed / speed).min(1.0).max(-1.0).asin()
    } else {
        0.0
    };
    state.orientation_ned_rad.z = ramp(initial.orientation_ned_rad.z, 0.0, roll_rate_rads, dt);

    state
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::geo::EARTH_RADIUS_M;
    use std::f64::consts::PI;

    fn level_east(speed: f64) -> KinematicState {
        KinematicState::level_flight(0.0, 0.0, 0.0, PI / 2.0, speed)
    }

    #[test]
    fn test_zero_dt_is_identity() {
        let initial = level_east(100.0);
        let segment = Segment::Arc {
            duration_s: 10.0,
            axis_wcs: Vector3::z(),
            rotation_radius_m: EARTH_RADIUS_M,
            speed_ms: 100.0,
            target_roll_rad: 0.0,
            roll_rate_rads: 1.0,
        };
        let state = segment.compute_state(&initial, 0.0);
        assert_eq!(state.latitude_deg, initial.latitude_deg);
        assert_eq!(state.longitude_deg, initial.longitude_deg);
        assert_eq!(state.velocity_ned_ms, initial.velocity_ned_ms);
    }

    #[test]
    fn test_arc_along_equator() {
        // Flying east on the equator, the great circle axis is the pole.
        let initial = level_east(100.0);
        let segment = Segment::Arc {
            duration_s: 1000.0,
            axis_wcs: Vector3::z(),
            rotation_radius_m: EARTH_RADIUS_M,
            speed_ms: 100.0,
            target_roll_rad: 0.0,
            roll_rate_rads: 1.0,
        };
        let state = segment.compute_state(&initial, 1000.0);
        let expected_lon = (100.0 * 1000.0 / EARTH_RADIUS_M).to_degrees();
        assert!(state.latitude_deg.abs() < 1e-9);
        assert!((state.longitude_deg - expected_lon).abs() < 1e-9);
        assert!((state.speed_ms() - 100.0).abs() < 1e-9);
        assert!(state.altitude_m.abs() < 1e-6);
    }

    #[test]
    fn test_dynamics_acceleration() {
        let initial = level_east(50.0);
        let segment = Segment::Dynamics {
            duration_s: 10.0,
            axis_wcs: Vector3::z(),
            rotation_radius_m: EARTH_RADIUS_M,
            linear_accel_ms2: 2.0,
            climb_rate_ms: 0.0,
            flight_angle_rad: 0.0,
            roll_rate_rads: 1.0,
            is_approximation: false,
        };
        let state = segment.compute_state(&initial, 10.0);
        assert!((state.speed_ms() - 70.0).abs() < 1e-9);
        assert!(state.altitude_m.abs() < 1e-6);
    }

    #[test]
    fn test_dynamics_climb() {
        let initial = level_east(100.0);
        let segment = Segment::Dynamics {
            duration_s: 20.0,
            axis_wcs: Vector3::z(),
            rotation_radius_m: EARTH_RADIUS_M,
            linear_accel_ms2: 0.0,
            climb_rate_ms: 5.0,
            flight_angle_rad: 0.0,
            roll_rate_rads: 1.0,
            is_approximation: false,
        };
        let state = segment.compute_state(&initial, 20.0);
        assert!((state.altitude_m - 100.0).abs() < 1e-6);
        assert!((-state.velocity_ned_ms.z - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_pause_holds_state() {
        let initial = level_east(100.0);
        let segment = Segment::Pause { duration_s: 5.0 };
        let state = segment.compute_state(&initial, 2.5);
        assert_eq!(state.latitude_deg, initial.latitude_deg);
        assert_eq!(state.longitude_deg, initial.longitude_deg);
    }

    #[test]
    fn test_dynamics_does_not_reverse() {
        let initial = level_east(10.0);
        let segment = Segment::Dynamics {
            duration_s: 100.0,
            axis_wcs: Vector3::z(),
            rotation_radius_m: EARTH_RADIUS_M,
            linear_accel_ms2: -1.0,
            climb_rate_ms: 0.0,
            flight_angle_rad: 0.0,
            roll_rate_rads: 1.0,
            is_approximation: false,
        };
        // Stop time is 10 s, sampling later must not move backwards
        let at_stop = segment.compute_state(&initial, 10.0);
        let later = segment.compute_state(&initial, 50.0);
        assert!((later.longitude_deg - at_stop.longitude_deg).abs() < 1e-12);
        assert!(later.speed_ms() < 1e-9);
    }
}
