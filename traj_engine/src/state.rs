//! # Kinematic state
//!
//! The instantaneous state of the craft: geodetic position, NED orientation
//! and NED velocity and acceleration. States are cheap `Copy` values, the
//! trajectory sampler produces them by the thousand.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::geo;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Instantaneous kinematic state of the craft.
///
/// Velocity and acceleration are in the local north-east-down frame at the
/// current position. Orientation is `[heading, pitch, roll]` in radians,
/// heading clockwise from north.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KinematicState {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,

    pub orientation_ned_rad: Vector3<f64>,

    pub velocity_ned_ms: Vector3<f64>,

    pub acceleration_ned_ms2: Vector3<f64>,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl KinematicState {
    /// A state at the given position flying level at the given heading and
    /// speed, with no acceleration.
    pub fn level_flight(
        lat_deg: f64,
        lon_deg: f64,
        alt_m: f64,
        heading_rad: f64,
        speed_ms: f64,
    ) -> Self {
        Self {
            latitude_deg: lat_deg,
            longitude_deg: lon_deg,
            altitude_m: alt_m,
            orientation_ned_rad: Vector3::new(heading_rad, 0.0, 0.0),
            velocity_ned_ms: Vector3::new(
                speed_ms * heading_rad.cos(),
                speed_ms * heading_rad.sin(),
                0.0,
            ),
            acceleration_ned_ms2: Vector3::zeros(),
        }
    }

    /// Total speed in m/s.
    pub fn speed_ms(&self) -> f64 {
        self.velocity_ned_ms.norm()
    }

    /// Speed over the ground in m/s.
    pub fn ground_speed_ms(&self) -> f64 {
        (self.velocity_ned_ms.x.powi(2) + self.velocity_ned_ms.y.powi(2)).sqrt()
    }

    /// Heading of the velocity vector, falling back to the orientation
    /// heading when the craft is not moving horizontally.
    pub fn heading_rad(&self) -> f64 {
        if self.ground_speed_ms() > 1.0e-12 {
            self.velocity_ned_ms.y.atan2(self.velocity_ned_ms.x)
        } else {
            self.orientation_ned_rad.x
        }
    }

    /// Roll angle in radians.
    pub fn roll_rad(&self) -> f64 {
        self.orientation_ned_rad.z
    }

    /// Position as a WCS vector.
    pub fn position_wcs(&self) -> Vector3<f64> {
        geo::lla_to_wcs(self.latitude_deg, self.longitude_deg, self.altitude_m)
    }

    /// Velocity as a WCS vector.
    pub fn velocity_wcs(&self) -> Vector3<f64> {
        geo::ned_to_wcs_at(self.latitude_deg, self.longitude_deg, &self.velocity_ned_ms)
    }

    /// Rebuild position and velocity from WCS vectors, keeping the
    /// orientation pitch and roll. Heading is realigned to the new velocity.
    pub fn set_from_wcs(&mut self, position_wcs: &Vector3<f64>, velocity_wcs: &Vector3<f64>) {
        let (lat, lon, alt) = geo::wcs_to_lla(position_wcs);
        self.latitude_deg = lat;
        self.longitude_deg = lon;
        self.altitude_m = alt;
        self.velocity_ned_ms = geo::wcs_to_ned_at(lat, lon, velocity_wcs);
        self.orientation_ned_rad.x = self.heading_rad();
    }

    /// Great circle distance in metres to another state's position.
    pub fn distance_to_m(&self, other: &KinematicState) -> f64 {
        geo::great_circle_heading_distance(
            self.latitude_deg,
            self.longitude_deg,
            other.latitude_deg,
            other.longitude_deg,
        )
        .1
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_level_flight_velocity() {
        let state = KinematicState::level_flight(0.0, 0.0, 1000.0, PI / 2.0, 50.0);
        assert!((state.speed_ms() - 50.0).abs() < 1e-9);
        assert!(state.velocity_ned_ms.x.abs() < 1e-9);
        assert!((state.velocity_ned_ms.y - 50.0).abs() < 1e-9);
        assert!((state.heading_rad() - PI / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_wcs_roundtrip_preserves_state() {
        let mut state = KinematicState::level_flight(30.0, -45.0, 5000.0, 1.0, 120.0);
        let pos = state.position_wcs();
        let vel = state.velocity_wcs();
        state.set_from_wcs(&pos, &vel);
        assert!((state.latitude_deg - 30.0).abs() < 1e-9);
        assert!((state.longitude_deg + 45.0).abs() < 1e-9);
        assert!((state.altitude_m - 5000.0).abs() < 1e-6);
        assert!((state.heading_rad() - 1.0).abs() < 1e-9);
    }
}
