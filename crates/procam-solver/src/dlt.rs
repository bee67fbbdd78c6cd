//! Projection-matrix estimation and decomposition.
//!
//! A normalized DLT recovers `P = K [R | t]` up to scale from non-coplanar
//! correspondences; an RQ decomposition splits it into intrinsics and pose.

use nalgebra::{DMatrix, Matrix3, Matrix3x4, Point2, Point3, Vector3};
use procam_core::normalize_points;

use crate::math::{argmin, mat34_from_svd_row, normalize_points_3d};
use crate::SolverError;

/// Minimum correspondences for the 3x4 DLT.
pub const MIN_DLT_POINTS: usize = 6;

/// Camera matrix decomposition into `K`, `R`, `t` with `K` upper-triangular.
#[derive(Debug, Clone)]
pub struct CameraMatrixDecomposition {
    /// Intrinsics, normalized so that `K[2,2] = 1`.
    pub k: Matrix3<f64>,
    /// Rotation matrix (orthonormal, det=+1).
    pub r: Matrix3<f64>,
    /// Translation vector in camera coordinates.
    pub t: Vector3<f64>,
}

/// Estimate a camera projection matrix `P` using normalized DLT.
///
/// The output is defined up to a global scale.
pub fn dlt_camera_matrix(
    world: &[Point3<f64>],
    image: &[Point2<f64>],
) -> Result<Matrix3x4<f64>, SolverError> {
    let n = world.len();
    if n != image.len() {
        return Err(SolverError::MismatchedPoints {
            world: n,
            image: image.len(),
        });
    }
    if n < MIN_DLT_POINTS {
        return Err(SolverError::NotEnoughPoints {
            needed: MIN_DLT_POINTS,
            got: n,
        });
    }

    let (world_n, t_w) = normalize_points_3d(world)
        .ok_or(SolverError::Degenerate("world points coincide"))?;
    let (image_n, t_i) = normalize_points(image);

    let mut a = DMatrix::<f64>::zeros(2 * n, 12);
    for (i, (pw, pi)) in world_n.iter().zip(image_n.iter()).enumerate() {
        let (x, y, z) = (pw.x, pw.y, pw.z);
        let (u, v) = (pi.x, pi.y);
        let r0 = 2 * i;
        let r1 = 2 * i + 1;

        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = z;
        a[(r0, 3)] = 1.0;
        a[(r0, 8)] = -u * x;
        a[(r0, 9)] = -u * y;
        a[(r0, 10)] = -u * z;
        a[(r0, 11)] = -u;

        a[(r1, 4)] = x;
        a[(r1, 5)] = y;
        a[(r1, 6)] = z;
        a[(r1, 7)] = 1.0;
        a[(r1, 8)] = -v * x;
        a[(r1, 9)] = -v * y;
        a[(r1, 10)] = -v * z;
        a[(r1, 11)] = -v;
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t.ok_or(SolverError::SvdFailed)?;
    let idx = argmin(svd.singular_values.iter().copied()).ok_or(SolverError::SvdFailed)?;
    let p_norm = mat34_from_svd_row(&v_t, idx);

    let t_i_inv = t_i.try_inverse().ok_or(SolverError::SvdFailed)?;
    Ok(t_i_inv * p_norm * t_w)
}

/// RQ decomposition of a 3x3 matrix.
///
/// Returns `(K, R)` with `K` upper-triangular with positive diagonal and `R`
/// orthonormal.
pub fn rq_decompose(m: &Matrix3<f64>) -> (Matrix3<f64>, Matrix3<f64>) {
    let j = Matrix3::new(0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0);

    let m1 = j * m.transpose() * j;
    let qr = m1.qr();

    let mut k = j * qr.r().transpose() * j;
    let mut r = j * qr.q().transpose() * j;

    let mut d = Matrix3::identity();
    for i in 0..3 {
        if k[(i, i)] < 0.0 {
            d[(i, i)] = -1.0;
        }
    }
    k *= d;
    r = d * r;

    (k, r)
}

/// Decompose `P ~ K [R | t]`.
pub fn decompose_camera_matrix(
    p: &Matrix3x4<f64>,
) -> Result<CameraMatrixDecomposition, SolverError> {
    let m = p.fixed_view::<3, 3>(0, 0).into_owned();
    let (k, mut r) = rq_decompose(&m);

    let k_inv = k
        .try_inverse()
        .ok_or(SolverError::Degenerate("projection matrix has rank < 3"))?;
    let mut t: Vector3<f64> = k_inv * p.column(3);

    if r.determinant() < 0.0 {
        r = -r;
        t = -t;
    }

    let scale = k[(2, 2)];
    if scale.abs() < f64::EPSILON {
        return Err(SolverError::Degenerate("projection matrix has rank < 3"));
    }

    Ok(CameraMatrixDecomposition { k: k / scale, r, t })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Rotation3, Vector4};

    fn project(p: &Matrix3x4<f64>, w: &Point3<f64>) -> Point2<f64> {
        let x = p * Vector4::new(w.x, w.y, w.z, 1.0);
        Point2::new(x.x / x.z, x.y / x.z)
    }

    fn ground_truth() -> (Matrix3<f64>, Matrix3<f64>, Vector3<f64>, Matrix3x4<f64>) {
        let k = Matrix3::new(900.0, -2.0, 640.0, 0.0, 870.0, 360.0, 0.0, 0.0, 1.0);
        let r = *Rotation3::from_euler_angles(-0.1, 0.05, 0.2).matrix();
        let t = Vector3::new(-0.2, 0.1, 1.5);
        let mut p = Matrix3x4::zeros();
        p.fixed_view_mut::<3, 3>(0, 0).copy_from(&(k * r));
        p.set_column(3, &(k * t));
        (k, r, t, p)
    }

    #[test]
    fn dlt_recovers_intrinsics_and_pose() {
        let (k, r, t, p) = ground_truth();
        let mut world = Vec::new();
        for z in 0..2 {
            for y in 0..3 {
                for x in 0..4 {
                    world.push(Point3::new(x as f64 * 0.2, y as f64 * 0.15, z as f64 * 0.1));
                }
            }
        }
        let image: Vec<_> = world.iter().map(|w| project(&p, w)).collect();

        let est = dlt_camera_matrix(&world, &image).unwrap();
        let dec = decompose_camera_matrix(&est).unwrap();
        assert_abs_diff_eq!(dec.k, k, epsilon = 1e-5);
        assert_abs_diff_eq!(dec.r, r, epsilon = 1e-8);
        assert_abs_diff_eq!(dec.t, t, epsilon = 1e-8);
    }

    #[test]
    fn negative_scale_is_resolved() {
        let (k, r, t, p) = ground_truth();
        let dec = decompose_camera_matrix(&(p * -3.0)).unwrap();
        assert_abs_diff_eq!(dec.k, k, epsilon = 1e-9);
        assert_abs_diff_eq!(dec.r, r, epsilon = 1e-9);
        assert_abs_diff_eq!(dec.t, t, epsilon = 1e-9);
    }

    #[test]
    fn too_few_points() {
        let w = vec![Point3::origin(); 5];
        let i = vec![Point2::origin(); 5];
        assert_eq!(
            dlt_camera_matrix(&w, &i).unwrap_err(),
            SolverError::NotEnoughPoints { needed: 6, got: 5 }
        );
    }
}
