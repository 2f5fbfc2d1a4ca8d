//! # Spherical earth geometry
//!
//! All positions in the engine live on a spherical earth. Geodetic
//! coordinates (latitude, longitude in degrees, altitude in metres) convert
//! to world cartesian system (WCS) vectors with the origin at the earth
//! centre, the X axis through 0N 0E, and the Z axis through the north pole.
//!
//! The sphere radius is chosen so that one arc minute on a great circle is
//! exactly one nautical mile.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Rotation3, Unit, Vector3};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Metres per nautical mile.
pub const M_PER_NM: f64 = 1852.0;

/// Spherical earth radius in metres, such that 1 arc minute = 1 nautical
/// mile along a great circle.
pub const EARTH_RADIUS_M: f64 = 6366707.019493707;

/// Standard gravitational acceleration in m/s^2.
pub const STANDARD_GRAVITY_MS2: f64 = 9.80665;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Earth radius at the given altitude, i.e. distance from the earth centre
/// of a point at that altitude.
pub fn earth_radius_at_altitude(altitude_m: f64) -> f64 {
    EARTH_RADIUS_M + altitude_m
}

/// Convert a geodetic position into a WCS vector.
pub fn lla_to_wcs(lat_deg: f64, lon_deg: f64, alt_m: f64) -> Vector3<f64> {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let r = EARTH_RADIUS_M + alt_m;

    Vector3::new(
        r * lat.cos() * lon.cos(),
        r * lat.cos() * lon.sin(),
        r * lat.sin(),
    )
}

/// Convert a WCS vector into a geodetic position `(lat_deg, lon_deg, alt_m)`.
pub fn wcs_to_lla(wcs: &Vector3<f64>) -> (f64, f64, f64) {
    let r = wcs.norm();
    let lat = (wcs.z / r).asin();
    let lon = wcs.y.atan2(wcs.x);

    (lat.to_degrees(), lon.to_degrees(), r - EARTH_RADIUS_M)
}

/// Unit vectors of the local north-east-down frame at a geodetic position,
/// expressed in WCS.
pub fn ned_basis_at(lat_deg: f64, lon_deg: f64) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();

    let north = Vector3::new(-lat.sin() * lon.cos(), -lat.sin() * lon.sin(), lat.cos());
    let east = Vector3::new(-lon.sin(), lon.cos(), 0.0);
    let down = Vector3::new(-lat.cos() * lon.cos(), -lat.cos() * lon.sin(), -lat.sin());

    (north, east, down)
}

/// Convert a vector in the local NED frame at the given position into WCS.
pub fn ned_to_wcs_at(lat_deg: f64, lon_deg: f64, ned: &Vector3<f64>) -> Vector3<f64> {
    let (north, east, down) = ned_basis_at(lat_deg, lon_deg);

    north * ned.x + east * ned.y + down * ned.z
}

/// Convert a WCS vector into the local NED frame at the given position.
pub fn wcs_to_ned_at(lat_deg: f64, lon_deg: f64, wcs: &Vector3<f64>) -> Vector3<f64> {
    let (north, east, down) = ned_basis_at(lat_deg, lon_deg);

    Vector3::new(wcs.dot(&north), wcs.dot(&east), wcs.dot(&down))
}

/// Initial heading (radians clockwise from north) and great circle distance
/// (metres) from one geodetic position to another.
pub fn great_circle_heading_distance(
    lat1_deg: f64,
    lon1_deg: f64,
    lat2_deg: f64,
    lon2_deg: f64,
) -> (f64, f64) {
    let lat1 = lat1_deg.to_radians();
    let lat2 = lat2_deg.to_radians();
    let dlon = (lon2_deg - lon1_deg).to_radians();

    let cos_angle = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * dlon.cos();
    let angle = cos_angle.min(1.0).max(-1.0).acos();

    let heading = (lat2.cos() * dlon.sin())
        .atan2(lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos());

    (heading, angle * EARTH_RADIUS_M)
}

/// Extrapolate along a great circle from a geodetic position with the given
/// initial heading, returning the new `(lat_deg, lon_deg)`.
pub fn extrapolate_great_circle(
    lat_deg: f64,
    lon_deg: f64,
    heading_rad: f64,
    distance_m: f64,
) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let angle = distance_m / EARTH_RADIUS_M;

    let new_lat = (lat.sin() * angle.cos() + lat.cos() * angle.sin() * heading_rad.cos()).asin();
    let new_lon = lon
        + (heading_rad.sin() * angle.sin() * lat.cos())
            .atan2(angle.cos() - lat.sin() * new_lat.sin());

    (new_lat.to_degrees(), new_lon.to_degrees())
}

/// Rotate a vector about an axis by the given angle (right hand rule).
pub fn rotate_about(v: &Vector3<f64>, axis: &Vector3<f64>, angle_rad: f64) -> Vector3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_rad) * v
}

/// Unit vectors perpendicular to the given axis, pointing locally north and
/// east at the point where the axis pierces the sphere.
///
/// Falls back to an arbitrary perpendicular pair when the axis is aligned
/// with the pole.
pub fn perpendicular_basis(axis: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let pole = Vector3::z();

    let mut eastern = pole.cross(axis);
    if eastern.norm() < 1.0e-12 {
        eastern = Vector3::x().cross(axis);
    }
    let eastern = eastern.normalize();
    let northern = axis.cross(&eastern).normalize();

    (northern, eastern)
}

/// Tangent point on a circle of the given radius centred at the origin,
/// such that travel around the circle in the given sense departs the circle
/// at the tangent point towards the target `(px, py)`.
///
/// Coordinates are the local 2D frame produced by [`perpendicular_basis`]
/// with `x` north and `y` east, so increasing polar angle is clockwise when
/// viewed from above. Returns `None` if the target lies on or inside the
/// circle.
pub fn circle_point_tangent(
    radius: f64,
    px: f64,
    py: f64,
    clockwise: bool,
) -> Option<(f64, f64)> {
    let d = (px * px + py * py).sqrt();
    if d <= radius {
        return None;
    }

    let alpha = (radius / d).acos();
    let phi = py.atan2(px);
    let theta = if clockwise { phi - alpha } else { phi + alpha };

    Some((radius * theta.cos(), radius * theta.sin()))
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
