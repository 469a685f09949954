//! Line segment primitives used by the path geometry queries.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// The z component of the cross product of two planar vectors.
#[inline]
pub fn cross2(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a[0] * b[1] - a[1] * b[0]
}

/// Foot of the perpendicular from `q` onto the infinite line through `a` and
/// `b`.
pub fn projection(a: &Vector2<f64>, b: &Vector2<f64>, q: &Vector2<f64>) -> Vector2<f64> {
    let ab = b - a;
    let r = ab.dot(&(q - a)) / ab.norm_squared();
    a + ab * r
}

/// Signed perpendicular distance from `q` to the line through `a` and `b`.
///
/// The sign is positive when `q` lies to the left of the direction `a -> b`.
pub fn line_distance(a: &Vector2<f64>, b: &Vector2<f64>, q: &Vector2<f64>) -> f64 {
    cross2(&(b - a), &(q - a)) / (b - a).norm()
}

/// Distance from `q` to the segment `a -> b`, clamped to the segment ends.
///
/// When the foot of the perpendicular falls outside the segment the distance
/// to the nearer endpoint is returned instead.
pub fn line_strip_distance(a: &Vector2<f64>, b: &Vector2<f64>, q: &Vector2<f64>) -> f64 {
    if (b - a).dot(&(q - a)) <= 0.0 {
        return (q - a).norm();
    }
    if (a - b).dot(&(q - b)) <= 0.0 {
        return (q - b).norm();
    }
    line_distance(a, b, q).abs()
}

/// Signed curvature of the circle circumscribing the three points.
///
/// Positive curvature turns to the left. Returns 0 for degenerate inputs
/// (coincident or collinear points).
pub fn curv3p(a: &Vector2<f64>, b: &Vector2<f64>, c: &Vector2<f64>) -> f64 {
    let denom_sq = (b - a).norm_squared() * (c - b).norm_squared() * (c - a).norm_squared();
    if denom_sq <= 0.0 {
        return 0.0;
    }

    let num = 2.0
        * (a[0] * b[1] + b[0] * c[1] + c[0] * a[1] - a[0] * c[1] - b[0] * a[1] - c[0] * b[1]);

    let curv = num / denom_sq.sqrt();
    if curv.is_finite() {
        curv
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_projection() {
        let a = Vector2::new(0.0, 0.0);
        let b = Vector2::new(2.0, 0.0);

        let foot = projection(&a, &b, &Vector2::new(0.5, 1.0));
        assert!((foot - Vector2::new(0.5, 0.0)).norm() < 1e-12);

        // The projection is onto the infinite line, not the segment
        let foot = projection(&a, &b, &Vector2::new(3.0, -2.0));
        assert!((foot - Vector2::new(3.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_line_distance_sign() {
        let a = Vector2::new(0.0, 0.0);
        let b = Vector2::new(1.0, 0.0);

        // Left of a -> b is positive
        assert!((line_distance(&a, &b, &Vector2::new(0.5, 0.3)) - 0.3).abs() < 1e-12);
        assert!((line_distance(&a, &b, &Vector2::new(0.5, -0.3)) + 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_line_strip_distance_clamps() {
        let a = Vector2::new(0.0, 0.0);
        let b = Vector2::new(1.0, 0.0);

        // Inside the segment: perpendicular distance
        assert!((line_strip_distance(&a, &b, &Vector2::new(0.5, 0.4)) - 0.4).abs() < 1e-12);

        // Beyond either end: endpoint distance
        assert!((line_strip_distance(&a, &b, &Vector2::new(-3.0, 4.0)) - 5.0).abs() < 1e-12);
        assert!((line_strip_distance(&a, &b, &Vector2::new(4.0, 4.0)) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_curv3p_circle() {
        // Three points on a CCW circle of radius 2 centred at the origin
        let a = Vector2::new(2.0, 0.0);
        let b = Vector2::new(0.0, 2.0);
        let c = Vector2::new(-2.0, 0.0);
        assert!((curv3p(&a, &b, &c) - 0.5).abs() < 1e-12);

        // Reversing the winding flips the sign
        assert!((curv3p(&c, &b, &a) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_curv3p_degenerate() {
        let a = Vector2::new(0.0, 0.0);
        let b = Vector2::new(1.0, 0.0);

        // Collinear points have zero curvature
        assert_eq!(curv3p(&a, &b, &Vector2::new(2.0, 0.0)), 0.0);

        // Coincident points are degenerate
        assert_eq!(curv3p(&a, &a, &b), 0.0);
    }
}
