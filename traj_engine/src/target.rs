//! # Path targets
//!
//! A [`PathTarget`] tells the path computer what the next leg should achieve.
//! Which fields are meaningful is governed by [`TargetFlags`], numeric fields
//! are only read when the matching flag is set.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::ops::BitOr;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Which way to take a commanded turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnDirection {
    Left,
    Shortest,
    Right,
}

impl Default for TurnDirection {
    fn default() -> Self {
        TurnDirection::Shortest
    }
}

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Bit set describing which goals a [`PathTarget`] carries and how the leg
/// towards it should be flown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFlags(u32);

impl TargetFlags {
    /// Fly to the target latitude and longitude.
    pub const LOCATION: TargetFlags = TargetFlags(0x0001);
    /// Achieve the target altitude.
    pub const ALTITUDE: TargetFlags = TargetFlags(0x0002);
    /// Achieve the target heading.
    pub const HEADING: TargetFlags = TargetFlags(0x0004);
    /// Achieve the target speed.
    pub const SPEED: TargetFlags = TargetFlags(0x0008);
    /// Continue indefinitely on the current (or newly achieved) heading.
    pub const EXTRAPOLATE: TargetFlags = TargetFlags(0x0010);
    /// Begin the turn towards the following point before reaching this one.
    pub const TURN_ON_APPROACH: TargetFlags = TargetFlags(0x0020);
    /// The heading goal is relative to the current heading.
    pub const RELATIVE_TURN: TargetFlags = TargetFlags(0x0040);
    /// The location must be passed through even if the turn geometry fails.
    pub const REQUIRED_POINT: TargetFlags = TargetFlags(0x0080);
    /// The location may be skipped when the turn geometry cannot reach it.
    pub const OPTIONAL_POINT: TargetFlags = TargetFlags(0x0100);
    /// Arrive at the location at a specified time, adjusting speed.
    pub const TIME_TO_POINT: TargetFlags = TargetFlags(0x0200);

    pub fn empty() -> Self {
        TargetFlags(0)
    }

    pub fn contains(&self, other: TargetFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: TargetFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: TargetFlags) {
        self.0 &= !other.0;
    }
}

impl BitOr for TargetFlags {
    type Output = TargetFlags;

    fn bitor(self, rhs: TargetFlags) -> TargetFlags {
        TargetFlags(self.0 | rhs.0)
    }
}

/// Goal description for a single leg of a path.
///
/// Numeric fields are only meaningful when the matching flag is set in
/// `flags`, except `turn_direction` and `turn_failure_threshold` which always
/// apply.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PathTarget {
    pub flags: TargetFlags,

    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,

    /// Heading goal in radians, absolute or relative depending on
    /// `RELATIVE_TURN`.
    pub heading_rad: f64,

    pub speed_ms: f64,

    /// Ordered ground distance for the leg in metres, zero when unset.
    pub distance_m: f64,

    /// Ordered duration for the leg in seconds, zero when unset. With
    /// `TIME_TO_POINT` this is the required arrival time instead.
    pub time_s: f64,

    pub turn_direction: TurnDirection,

    /// Multiple of the turn radius within which a turn-to-point solution is
    /// accepted.
    pub turn_failure_threshold: f64,

    /// Location of the point after this one, used with `TURN_ON_APPROACH`.
    pub next_latitude_deg: f64,
    pub next_longitude_deg: f64,

    /// Radial acceleration to use for the approach turn onto the next leg.
    pub next_radial_accel_ms2: f64,
}

impl Default for PathTarget {
    fn default() -> Self {
        Self {
            flags: TargetFlags::empty(),
            latitude_deg: 0.0,
            longitude_deg: 0.0,
            altitude_m: 0.0,
            heading_rad: 0.0,
            speed_ms: 0.0,
            distance_m: 0.0,
            time_s: 0.0,
            turn_direction: TurnDirection::Shortest,
            turn_failure_threshold: 1.0,
            next_latitude_deg: 0.0,
            next_longitude_deg: 0.0,
            next_radial_accel_ms2: 0.0,
        }
    }
}

impl PathTarget {
    /// A target which flies to the given location.
    pub fn to_location(lat_deg: f64, lon_deg: f64) -> Self {
        let mut target = Self::default();
        target.flags.insert(TargetFlags::LOCATION);
        target.latitude_deg = lat_deg;
        target.longitude_deg = lon_deg;
        target
    }

    /// A target which turns to the given absolute heading and extrapolates.
    pub fn to_heading(heading_rad: f64) -> Self {
        let mut target = Self::default();
        target
            .flags
            .insert(TargetFlags::HEADING | TargetFlags::EXTRAPOLATE);
        target.heading_rad = heading_rad;
        target
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_flag_ops() {
        let mut flags = TargetFlags::LOCATION | TargetFlags::SPEED;
        assert!(flags.contains(TargetFlags::LOCATION));
        assert!(!flags.contains(TargetFlags::HEADING));
        assert!(!flags.contains(TargetFlags::LOCATION | TargetFlags::HEADING));

        flags.remove(TargetFlags::SPEED);
        assert!(!flags.contains(TargetFlags::SPEED));

        flags.insert(TargetFlags::EXTRAPOLATE);
        assert!(flags.contains(TargetFlags::EXTRAPOLATE));
    }
}
