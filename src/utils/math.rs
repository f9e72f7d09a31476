//! Additional 2D math helpers layered on top of `glam`.

use glam::{Mat2, Mat3, Vec2, Vec3};

/// Scalar cross product of two vectors (z component of the 3D cross product).
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Cross product of a vector and a scalar: `v x s`.
#[inline]
pub fn cross_vs(v: Vec2, s: f32) -> Vec2 {
    Vec2::new(s * v.y, -s * v.x)
}

/// Cross product of a scalar and a vector: `s x v`.
#[inline]
pub fn cross_sv(s: f32, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

/// Solves `k * x = b` for a 2x2 matrix, returning zero when `k` is singular.
pub fn solve22(k: Mat2, b: Vec2) -> Vec2 {
    let (a11, a12, a21, a22) = (k.x_axis.x, k.y_axis.x, k.x_axis.y, k.y_axis.y);
    let mut det = a11 * a22 - a12 * a21;
    if det != 0.0 {
        det = 1.0 / det;
    }
    Vec2::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
}

/// Solves `k * x = b` for a 3x3 matrix, returning zero when `k` is singular.
pub fn solve33(k: Mat3, b: Vec3) -> Vec3 {
    let mut det = k.x_axis.dot(k.y_axis.cross(k.z_axis));
    if det != 0.0 {
        det = 1.0 / det;
    }
    Vec3::new(
        det * b.dot(k.y_axis.cross(k.z_axis)),
        det * k.x_axis.dot(b.cross(k.z_axis)),
        det * k.x_axis.dot(k.y_axis.cross(b)),
    )
}

/// Normalizes `v` in place and returns its previous length; tiny vectors are left untouched.
pub fn normalize_and_length(v: &mut Vec2) -> f32 {
    let length = v.length();
    if length < f32::EPSILON {
        return 0.0;
    }
    *v /= length;
    length
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_helpers_match_3d_cross() {
        let a = Vec2::new(1.5, -2.0);
        let b = Vec2::new(0.25, 3.0);
        let expected = a.extend(0.0).cross(b.extend(0.0)).z;
        assert!((cross(a, b) - expected).abs() < 1e-6);
        assert!((cross_sv(2.0, a) - (-cross_vs(a, 2.0))).length() < 1e-6);
    }

    #[test]
    fn solve22_inverts_symmetric_system() {
        let k = Mat2::from_cols(Vec2::new(4.0, 1.0), Vec2::new(1.0, 3.0));
        let x = Vec2::new(0.5, -2.0);
        let solved = solve22(k, k * x);
        assert!((solved - x).length() < 1e-5);
    }

    #[test]
    fn solve33_inverts_system_and_tolerates_singular() {
        let k = Mat3::from_cols(
            Vec3::new(3.0, 0.5, 0.2),
            Vec3::new(0.5, 2.0, 0.1),
            Vec3::new(0.2, 0.1, 1.0),
        );
        let x = Vec3::new(1.0, -1.0, 2.0);
        assert!((solve33(k, k * x) - x).length() < 1e-5);
        assert_eq!(solve33(Mat3::ZERO, Vec3::ONE), Vec3::ZERO);
    }
}
