//! Quadric math kernel
//!
//! Small helpers over nalgebra's 4x4 matrices for the homogeneous quadric
//! arithmetic the cost engine needs. Matrices are column-major, matching
//! the homogeneous-coordinate convention used throughout.

use decimesh_core::{Point3f, Vector3f};
use nalgebra::{Matrix4, Vector4};

/// Lift a point to homogeneous coordinates.
#[inline]
pub fn homogeneous(p: &Point3f) -> Vector4<f64> {
    Vector4::new(p.x as f64, p.y as f64, p.z as f64, 1.0)
}

/// Fundamental error quadric of a plane: `K = p * p^T` for the homogeneous
/// plane equation `p = [a, b, c, d]` with `(a, b, c)` the unit normal and
/// `d = -normal . point` for any point on the plane.
pub fn plane_quadric(normal: &Vector3f, point: &Point3f) -> Matrix4<f64> {
    let d = -normal.dot(&point.coords);
    let p = Vector4::new(normal.x as f64, normal.y as f64, normal.z as f64, d as f64);
    p * p.transpose()
}

/// Replace the last row of a quadric with `[0, 0, 0, 1]`, turning the
/// minimization of `x^T Q x` into the linear system `Q' x = (0, 0, 0, 1)^T`.
pub fn clamp_homogeneous(q: &Matrix4<f64>) -> Matrix4<f64> {
    let mut m = *q;
    m[(3, 0)] = 0.0;
    m[(3, 1)] = 0.0;
    m[(3, 2)] = 0.0;
    m[(3, 3)] = 1.0;
    m
}

/// Solve for the position minimizing the quadratic form of `qe`.
///
/// Returns `None` when the clamped matrix is singular (determinant exactly
/// zero); the caller falls back to candidate evaluation.
pub fn optimal_position(qe: &Matrix4<f64>) -> Option<Vector4<f64>> {
    clamp_homogeneous(qe)
        .try_inverse()
        .map(|inv| inv * Vector4::new(0.0, 0.0, 0.0, 1.0))
}

/// Evaluate the quadratic form `p^T Q p`.
#[inline]
pub fn quadric_error(q: &Matrix4<f64>, p: &Vector4<f64>) -> f64 {
    p.dot(&(q * p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_plane_quadric_on_plane_point_has_zero_error() {
        // plane z = 2
        let normal = Vector3f::new(0.0, 0.0, 1.0);
        let k = plane_quadric(&normal, &Point3f::new(0.0, 0.0, 2.0));

        let on_plane = Vector4::new(5.0, -3.0, 2.0, 1.0);
        assert_relative_eq!(quadric_error(&k, &on_plane), 0.0, epsilon = 1e-9);

        // one unit off the plane: squared distance 1
        let off_plane = Vector4::new(5.0, -3.0, 3.0, 1.0);
        assert_relative_eq!(quadric_error(&k, &off_plane), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_optimal_position_of_three_orthogonal_planes() {
        // planes x = 1, y = 2, z = 3 intersect in exactly one point
        let q = plane_quadric(&Vector3f::new(1.0, 0.0, 0.0), &Point3f::new(1.0, 0.0, 0.0))
            + plane_quadric(&Vector3f::new(0.0, 1.0, 0.0), &Point3f::new(0.0, 2.0, 0.0))
            + plane_quadric(&Vector3f::new(0.0, 0.0, 1.0), &Point3f::new(0.0, 0.0, 3.0));

        let p = optimal_position(&q).expect("well-conditioned quadric must invert");
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 2.0, epsilon = 1e-9);
        assert_relative_eq!(p.z, 3.0, epsilon = 1e-9);
        assert_relative_eq!(p.w, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_optimal_position_singular_for_coplanar_quadrics() {
        // two copies of the same plane constrain only one direction
        let k = plane_quadric(&Vector3f::new(0.0, 0.0, 1.0), &Point3f::new(0.0, 0.0, 0.0));
        let q = k + k;
        assert!(optimal_position(&q).is_none());
    }

    #[test]
    fn test_clamp_keeps_upper_rows() {
        let k = plane_quadric(&Vector3f::new(0.0, 0.0, 1.0), &Point3f::new(0.0, 0.0, 1.0));
        let c = clamp_homogeneous(&k);
        for j in 0..4 {
            for i in 0..3 {
                assert_eq!(c[(i, j)], k[(i, j)]);
            }
        }
        assert_eq!(c[(3, 0)], 0.0);
        assert_eq!(c[(3, 1)], 0.0);
        assert_eq!(c[(3, 2)], 0.0);
        assert_eq!(c[(3, 3)], 1.0);
    }
}
