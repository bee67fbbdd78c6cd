//! Linear least-squares fit of Brown–Conrady coefficients.
//!
//! With the intrinsics and poses fixed, the distorted normalized point is
//! linear in `(k1, k2, k3, p1, p2)`; fixed terms are dropped from the system
//! and reported as zero.

use nalgebra::{DMatrix, DVector, Matrix3, Point2, Vector3};
use procam_core::Distortion;

use crate::{CalibrationFlags, SolverError};

/// Distortion-free normalized point paired with the observed pixel.
#[derive(Clone, Copy, Debug)]
pub struct DistortionSample {
    pub ideal: Point2<f64>,
    pub observed: Point2<f64>,
}

pub fn fit_distortion(
    k: &Matrix3<f64>,
    samples: &[DistortionSample],
    flags: &CalibrationFlags,
) -> Result<Distortion, SolverError> {
    let mut columns: usize = 1;
    if !flags.fix_k2 {
        columns += 1;
    }
    if !flags.fix_k3 {
        columns += 1;
    }
    if !flags.fix_tangential {
        columns += 2;
    }

    let min_points = columns.div_ceil(2) + 1;
    if samples.len() < min_points {
        return Err(SolverError::NotEnoughPoints {
            needed: min_points,
            got: samples.len(),
        });
    }

    let k_inv = k
        .try_inverse()
        .ok_or(SolverError::Degenerate("intrinsics matrix is not invertible"))?;

    let n = samples.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, columns);
    let mut b = DVector::<f64>::zeros(2 * n);
    let mut max_r2 = 0.0_f64;

    for (i, s) in samples.iter().enumerate() {
        let obs = k_inv * Vector3::new(s.observed.x, s.observed.y, 1.0);
        let (ox, oy) = (obs.x / obs.z, obs.y / obs.z);
        let (x, y) = (s.ideal.x, s.ideal.y);
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        max_r2 = max_r2.max(r2);

        let (r0, r1) = (2 * i, 2 * i + 1);
        let mut c = 0;
        a[(r0, c)] = x * r2;
        a[(r1, c)] = y * r2;
        c += 1;
        if !flags.fix_k2 {
            a[(r0, c)] = x * r4;
            a[(r1, c)] = y * r4;
            c += 1;
        }
        if !flags.fix_k3 {
            a[(r0, c)] = x * r4 * r2;
            a[(r1, c)] = y * r4 * r2;
            c += 1;
        }
        if !flags.fix_tangential {
            a[(r0, c)] = 2.0 * x * y;
            a[(r1, c)] = r2 + 2.0 * y * y;
            c += 1;
            a[(r0, c)] = r2 + 2.0 * x * x;
            a[(r1, c)] = 2.0 * x * y;
        }

        b[r0] = ox - x;
        b[r1] = oy - y;
    }

    if max_r2 < 1e-12 {
        log::debug!("all samples at the principal point; distortion left at zero");
        return Ok(Distortion::ZERO);
    }

    let svd = a.svd(true, true);
    let x = svd.solve(&b, 1e-12).map_err(|_| SolverError::SvdFailed)?;

    let mut it = x.iter().copied();
    let mut next = || it.next().unwrap_or(0.0);
    let k1 = next();
    let k2 = if flags.fix_k2 { 0.0 } else { next() };
    let k3 = if flags.fix_k3 { 0.0 } else { next() };
    let (p1, p2) = if flags.fix_tangential {
        (0.0, 0.0)
    } else {
        (next(), next())
    };

    Ok(Distortion { k1, k2, p1, p2, k3 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn k() -> Matrix3<f64> {
        Matrix3::new(800.0, 0.0, 640.0, 0.0, 800.0, 360.0, 0.0, 0.0, 1.0)
    }

    fn samples(d: &Distortion) -> Vec<DistortionSample> {
        let mut out = Vec::new();
        for i in -4..=4 {
            for j in -3..=3 {
                let ideal = Point2::new(i as f64 * 0.1, j as f64 * 0.1);
                let dist = d.distort(ideal);
                let px = k() * Vector3::new(dist.x, dist.y, 1.0);
                out.push(DistortionSample {
                    ideal,
                    observed: Point2::new(px.x, px.y),
                });
            }
        }
        out
    }

    #[test]
    fn recovers_all_terms() {
        let d = Distortion {
            k1: -0.2,
            k2: 0.05,
            p1: 0.001,
            p2: -0.002,
            k3: 0.01,
        };
        let flags = CalibrationFlags {
            fix_k3: false,
            ..CalibrationFlags::default()
        };
        let est = fit_distortion(&k(), &samples(&d), &flags).unwrap();
        for (a, b) in est.to_array().iter().zip(d.to_array().iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn fixed_terms_stay_zero() {
        let d = Distortion {
            k1: -0.1,
            p1: 0.002,
            p2: 0.001,
            ..Distortion::ZERO
        };
        let flags = CalibrationFlags {
            fix_k2: true,
            fix_k3: true,
            ..CalibrationFlags::default()
        };
        let est = fit_distortion(&k(), &samples(&d), &flags).unwrap();
        assert_eq!(est.k2, 0.0);
        assert_eq!(est.k3, 0.0);
        assert_abs_diff_eq!(est.k1, -0.1, epsilon = 1e-9);
        assert_abs_diff_eq!(est.p1, 0.002, epsilon = 1e-9);
    }

    #[test]
    fn principal_point_only_gives_zero() {
        let s = vec![
            DistortionSample {
                ideal: Point2::origin(),
                observed: Point2::new(640.0, 360.0),
            };
            4
        ];
        let est = fit_distortion(&k(), &s, &CalibrationFlags::default()).unwrap();
        assert!(est.is_zero());
    }
}
