//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::from(0.0).unwrap() {
        r + rhs.abs()
    } else {
        r
    }
}

/// Normalize an angle into the range `[0, 2pi)`.
pub fn normalize_two_pi<T>(angle: T) -> T
where
    T: Float,
{
    rem_euclid(angle, T::from(std::f64::consts::TAU).unwrap())
}

/// Normalize an angle into the range `[-pi, pi)`.
pub fn normalize_pi<T>(angle: T) -> T
where
    T: Float,
{
    let pi = T::from(std::f64::consts::PI).unwrap();
    let tau = T::from(std::f64::consts::TAU).unwrap();

    rem_euclid(angle + pi, tau) - pi
}

/// Find the smallest positive root of `c[0] + c[1]*t + c[2]*t^2 = 0`.
///
/// Returns `None` if no real positive root exists. The quadratic degenerates
/// gracefully to the linear case when `c[2]` is zero.
pub fn solve_quadric_min_pos(coeffs: &[f64; 3]) -> Option<f64> {
    let (c0, c1, c2) = (coeffs[0], coeffs[1], coeffs[2]);

    if c2.abs() < std::f64::EPSILON {
        // Linear: c0 + c1*t = 0
        if c1.abs() < std::f64::EPSILON {
            return None;
        }
        let t = -c0 / c1;
        return if t > 0.0 { Some(t) } else { None };
    }

    let discriminant = c1 * c1 - 4.0 * c2 * c0;
    if discriminant < 0.0 {
        return None;
    }

    let sqrt_d = discriminant.sqrt();
    let t0 = (-c1 - sqrt_d) / (2.0 * c2);
    let t1 = (-c1 + sqrt_d) / (2.0 * c2);

    let (lo, hi) = if t0 < t1 { (t0, t1) } else { (t1, t0) };
    if lo > 0.0 {
        Some(lo)
    } else if hi > 0.0 {
        Some(hi)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::{PI, TAU};

    #[test]
    fn test_normalize_pi() {
        assert!((normalize_pi(0.0f64)).abs() < 1e-12);
        assert!((normalize_pi(3.0 * PI) - (-PI)).abs() < 1e-12);
        assert!((normalize_pi(-0.5) - (-0.5)).abs() < 1e-12);
        assert!((normalize_pi(TAU + 0.25) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_two_pi() {
        assert!((normalize_two_pi(-0.5f64) - (TAU - 0.5)).abs() < 1e-12);
        assert!((normalize_two_pi(TAU + 0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_solve_quadric_min_pos() {
        // t^2 - 3t + 2 = 0 -> roots 1, 2
        let t = solve_quadric_min_pos(&[2.0, -3.0, 1.0]).unwrap();
        assert!((t - 1.0).abs() < 1e-12);

        // -4 + 0t + 1t^2 -> roots -2, 2, smallest positive is 2
        let t = solve_quadric_min_pos(&[-4.0, 0.0, 1.0]).unwrap();
        assert!((t - 2.0).abs() < 1e-12);

        // Linear fallback: -6 + 2t = 0 -> 3
        let t = solve_quadric_min_pos(&[-6.0, 2.0, 0.0]).unwrap();
        assert!((t - 3.0).abs() < 1e-12);

        // No real roots
        assert!(solve_quadric_min_pos(&[1.0, 0.0, 1.0]).is_none());
    }
}
