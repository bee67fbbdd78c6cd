//! Extrinsics from a known `K` and a homography or projection matrix.

use nalgebra::{Matrix3, Matrix3x4, Vector3};

use crate::math::orthonormalize;
use crate::SolverError;

/// Pose `(R, t)` of the plane frame from `H ~ K [r1 r2 t]`.
///
/// The sign of the homography is chosen so the plane lies in front of the
/// camera (`t.z > 0`).
pub fn pose_from_homography(
    k: &Matrix3<f64>,
    h: &Matrix3<f64>,
) -> Result<(Matrix3<f64>, Vector3<f64>), SolverError> {
    let k_inv = k
        .try_inverse()
        .ok_or(SolverError::Degenerate("intrinsics matrix is not invertible"))?;

    let k_inv_h1: Vector3<f64> = k_inv * h.column(0);
    let k_inv_h2: Vector3<f64> = k_inv * h.column(1);
    let k_inv_h3: Vector3<f64> = k_inv * h.column(2);

    let mean_norm = (k_inv_h1.norm() + k_inv_h2.norm()) * 0.5;
    if mean_norm <= f64::EPSILON {
        return Err(SolverError::Degenerate("homography has rank < 2"));
    }
    let mut lambda = 1.0 / mean_norm;
    if (lambda * k_inv_h3).z < 0.0 {
        lambda = -lambda;
    }

    let r1 = lambda * k_inv_h1;
    let r2 = lambda * k_inv_h2;
    let r3 = r1.cross(&r2);
    let r = orthonormalize(&Matrix3::from_columns(&[r1, r2, r3])).ok_or(SolverError::SvdFailed)?;

    Ok((r, lambda * k_inv_h3))
}

/// Pose from a full projection matrix `P ~ K [R | t]` with a shared `K`.
pub fn pose_from_projection(
    k: &Matrix3<f64>,
    p: &Matrix3x4<f64>,
) -> Result<(Matrix3<f64>, Vector3<f64>), SolverError> {
    let k_inv = k
        .try_inverse()
        .ok_or(SolverError::Degenerate("intrinsics matrix is not invertible"))?;
    let m = k_inv * p;
    let m3 = m.fixed_view::<3, 3>(0, 0).into_owned();

    // det(s R) = s^3 recovers scale and sign together.
    let scale = m3.determinant().cbrt();
    if scale.abs() <= f64::EPSILON {
        return Err(SolverError::Degenerate("projection matrix has rank < 3"));
    }
    let r = orthonormalize(&(m3 / scale)).ok_or(SolverError::SvdFailed)?;
    let t: Vector3<f64> = m.column(3) / scale;
    Ok((r, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Rotation3;

    fn k() -> Matrix3<f64> {
        Matrix3::new(800.0, 0.0, 640.0, 0.0, 780.0, 360.0, 0.0, 0.0, 1.0)
    }

    #[test]
    fn planar_pose_from_h() {
        let r = *Rotation3::from_euler_angles(0.1, -0.05, 0.2).matrix();
        let t = Vector3::new(0.1, -0.05, 1.0);
        let h = Matrix3::from_columns(&[k() * r.column(0), k() * r.column(1), k() * t]);

        for scale in [1.0, -0.01] {
            let (r_est, t_est) = pose_from_homography(&k(), &(h * scale)).unwrap();
            assert_abs_diff_eq!(r_est, r, epsilon = 1e-9);
            assert_abs_diff_eq!(t_est, t, epsilon = 1e-9);
        }
    }

    #[test]
    fn pose_from_scaled_projection() {
        let r = *Rotation3::from_euler_angles(-0.3, 0.2, 0.1).matrix();
        let t = Vector3::new(0.3, 0.1, 2.0);
        let mut p = Matrix3x4::zeros();
        p.fixed_view_mut::<3, 3>(0, 0).copy_from(&(k() * r));
        p.set_column(3, &(k() * t));

        let (r_est, t_est) = pose_from_projection(&k(), &(p * -7.0)).unwrap();
        assert_abs_diff_eq!(r_est, r, epsilon = 1e-9);
        assert_abs_diff_eq!(t_est, t, epsilon = 1e-9);
    }
}
