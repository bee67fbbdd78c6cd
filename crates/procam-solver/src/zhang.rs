//! Zhang's closed-form intrinsics from plane homographies.

use nalgebra::{DMatrix, Matrix3, SVector};

use crate::math::argmin;
use crate::SolverError;

pub const MIN_ZHANG_VIEWS: usize = 3;

fn v_ij(h: &Matrix3<f64>, i: usize, j: usize) -> SVector<f64, 6> {
    let hi = h.column(i);
    let hj = h.column(j);

    SVector::<f64, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

/// Estimate `K` from at least three plane-to-image homographies.
pub fn intrinsics_from_homographies(hs: &[Matrix3<f64>]) -> Result<Matrix3<f64>, SolverError> {
    if hs.len() < MIN_ZHANG_VIEWS {
        return Err(SolverError::NotEnoughPoints {
            needed: MIN_ZHANG_VIEWS,
            got: hs.len(),
        });
    }

    let m = hs.len();
    let mut v = DMatrix::<f64>::zeros((2 * m).max(6), 6);
    for (k, h) in hs.iter().enumerate() {
        // Scale each homography to unit norm so views weigh equally.
        let h = h / h.norm();
        let v11 = v_ij(&h, 0, 0);
        let v22 = v_ij(&h, 1, 1);
        let v12 = v_ij(&h, 0, 1);
        v.row_mut(2 * k).copy_from(&v12.transpose());
        v.row_mut(2 * k + 1).copy_from(&(v11 - v22).transpose());
    }

    let svd = v.svd(false, true);
    let v_t = svd.v_t.ok_or(SolverError::SvdFailed)?;
    let idx = argmin(svd.singular_values.iter().copied()).ok_or(SolverError::SvdFailed)?;
    let b = v_t.row(idx);
    let (b11, b12, b22, b13, b23, b33) = (b[0], b[1], b[2], b[3], b[4], b[5]);

    let denom = b11 * b22 - b12 * b12;
    let denom_norm = b11 * b11 + b22 * b22;
    if denom_norm <= 0.0 || denom.abs() / denom_norm <= 1e-12 {
        return Err(SolverError::Degenerate("plane views do not constrain intrinsics"));
    }

    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    if lambda.signum() != b11.signum() {
        return Err(SolverError::Degenerate("plane views do not constrain intrinsics"));
    }

    let alpha = (lambda / b11).sqrt();
    let beta = (lambda * b11 / denom).sqrt();
    let gamma = -b12 * alpha * alpha * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    let k = Matrix3::new(alpha, gamma, u0, 0.0, beta, v0, 0.0, 0.0, 1.0);
    if !k.iter().all(|x| x.is_finite()) {
        return Err(SolverError::Degenerate("plane views do not constrain intrinsics"));
    }
    Ok(k)
}

/// Focal lengths from one or more homographies with a known principal point
/// and zero skew.
///
/// Each view gives two linear equations in `(1/fx², 1/fy²)`; this is the
/// fallback when fewer than three plane views are available.
pub fn intrinsics_with_principal_point(
    hs: &[Matrix3<f64>],
    cx: f64,
    cy: f64,
) -> Result<Matrix3<f64>, SolverError> {
    if hs.is_empty() {
        return Err(SolverError::NotEnoughPoints { needed: 1, got: 0 });
    }

    let shift = Matrix3::new(1.0, 0.0, -cx, 0.0, 1.0, -cy, 0.0, 0.0, 1.0);
    let mut a = DMatrix::<f64>::zeros(2 * hs.len(), 2);
    let mut b = nalgebra::DVector::<f64>::zeros(2 * hs.len());
    for (k, h) in hs.iter().enumerate() {
        let h = shift * h;
        let h = h / h.norm();
        let (h1, h2) = (h.column(0), h.column(1));
        a[(2 * k, 0)] = h1[0] * h2[0];
        a[(2 * k, 1)] = h1[1] * h2[1];
        b[2 * k] = -h1[2] * h2[2];
        a[(2 * k + 1, 0)] = h1[0] * h1[0] - h2[0] * h2[0];
        a[(2 * k + 1, 1)] = h1[1] * h1[1] - h2[1] * h2[1];
        b[2 * k + 1] = -(h1[2] * h1[2] - h2[2] * h2[2]);
    }

    let svd = a.svd(true, true);
    let x = svd.solve(&b, 1e-15).map_err(|_| SolverError::SvdFailed)?;
    let (inv_fx2, inv_fy2) = (x[0], x[1]);
    if !(inv_fx2 > 0.0 && inv_fy2 > 0.0) {
        return Err(SolverError::Degenerate("plane views do not constrain focal length"));
    }

    Ok(Matrix3::new(
        1.0 / inv_fx2.sqrt(),
        0.0,
        cx,
        0.0,
        1.0 / inv_fy2.sqrt(),
        cy,
        0.0,
        0.0,
        1.0,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Rotation3, Vector3};

    fn homography(k: &Matrix3<f64>, rot: Rotation3<f64>, t: Vector3<f64>) -> Matrix3<f64> {
        let r = rot.matrix();
        let mut h = Matrix3::zeros();
        h.set_column(0, &(k * r.column(0)));
        h.set_column(1, &(k * r.column(1)));
        h.set_column(2, &(k * t));
        h
    }

    #[test]
    fn recovers_intrinsics() {
        let k = Matrix3::new(900.0, 0.0, 640.0, 0.0, 880.0, 360.0, 0.0, 0.0, 1.0);
        let hs = vec![
            homography(
                &k,
                Rotation3::from_euler_angles(0.1, 0.0, 0.05),
                Vector3::new(0.1, -0.05, 1.0),
            ),
            homography(
                &k,
                Rotation3::from_euler_angles(-0.05, 0.15, -0.1),
                Vector3::new(-0.05, 0.1, 1.2),
            ),
            // Scale and sign of a homography are arbitrary.
            -2.5 * homography(
                &k,
                Rotation3::from_euler_angles(0.2, -0.1, 0.0),
                Vector3::new(0.0, 0.0, 0.9),
            ),
        ];
        let est = intrinsics_from_homographies(&hs).unwrap();
        assert_abs_diff_eq!(est, k, epsilon = 1e-4);
    }

    #[test]
    fn focal_lengths_from_one_tilted_view() {
        let k = Matrix3::new(820.0, 0.0, 320.0, 0.0, 790.0, 240.0, 0.0, 0.0, 1.0);
        let h = homography(
            &k,
            Rotation3::from_euler_angles(0.4, -0.3, 0.1),
            Vector3::new(0.05, -0.02, 1.1),
        );
        let est = intrinsics_with_principal_point(&[h], 320.0, 240.0).unwrap();
        assert_abs_diff_eq!(est, k, epsilon = 1e-6);
    }

    #[test]
    fn fronto_parallel_view_is_degenerate() {
        let k = Matrix3::new(800.0, 0.0, 320.0, 0.0, 800.0, 240.0, 0.0, 0.0, 1.0);
        let h = homography(&k, Rotation3::identity(), Vector3::new(0.0, 0.0, 1.0));
        let err = intrinsics_with_principal_point(&[h], 320.0, 240.0).unwrap_err();
        assert!(matches!(err, SolverError::Degenerate(_)));
    }

    #[test]
    fn needs_three_views() {
        let err = intrinsics_from_homographies(&[Matrix3::identity(); 2]).unwrap_err();
        assert_eq!(err, SolverError::NotEnoughPoints { needed: 3, got: 2 });
    }
}
