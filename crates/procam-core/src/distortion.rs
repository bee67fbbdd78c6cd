//! Brown–Conrady radial/tangential lens distortion (`k1, k2, p1, p2, k3`).

use nalgebra::{Matrix2, Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::ModelError;

const UNDISTORT_MAX_ITERS: u32 = 50;
const UNDISTORT_EPS: f64 = 1e-14;

/// Distortion coefficients in the usual five-term order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    pub const ZERO: Distortion = Distortion {
        k1: 0.0,
        k2: 0.0,
        p1: 0.0,
        p2: 0.0,
        k3: 0.0,
    };

    /// Build from `[k1, k2, p1, p2, k3]`. Shorter slices are zero-padded,
    /// extra (rational-model) terms are ignored.
    pub fn from_slice(coeffs: &[f64]) -> Self {
        let at = |i: usize| coeffs.get(i).copied().unwrap_or(0.0);
        Self {
            k1: at(0),
            k2: at(1),
            p1: at(2),
            p2: at(3),
            k3: at(4),
        }
    }

    pub fn to_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn is_zero(&self) -> bool {
        self.to_array().iter().all(|c| *c == 0.0)
    }

    /// Apply distortion to a normalized image point `(x', y')`.
    #[inline]
    pub fn distort(&self, p: Point2<f64>) -> Point2<f64> {
        let (x, y) = (p.x, p.y);
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
        Point2::new(
            x * radial + 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x),
            y * radial + self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y,
        )
    }

    /// Jacobian of [`Distortion::distort`] with respect to the undistorted point.
    fn jacobian(&self, p: Point2<f64>) -> Matrix2<f64> {
        let (x, y) = (p.x, p.y);
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r4 * r2;
        // d(radial)/d(r2)
        let dradial = self.k1 + 2.0 * self.k2 * r2 + 3.0 * self.k3 * r4;

        let dxdx = radial + 2.0 * x * x * dradial + 2.0 * self.p1 * y + 6.0 * self.p2 * x;
        let dxdy = 2.0 * x * y * dradial + 2.0 * self.p1 * x + 2.0 * self.p2 * y;
        let dydx = 2.0 * x * y * dradial + 2.0 * self.p1 * x + 2.0 * self.p2 * y;
        let dydy = radial + 2.0 * y * y * dradial + 6.0 * self.p1 * y + 2.0 * self.p2 * x;

        Matrix2::new(dxdx, dxdy, dydx, dydy)
    }

    /// Invert [`Distortion::distort`] with Newton iterations, starting from the
    /// distorted point itself.
    pub fn undistort(&self, distorted: Point2<f64>) -> Result<Point2<f64>, ModelError> {
        if self.is_zero() {
            return Ok(distorted);
        }

        let mut p = distorted;
        for _ in 0..UNDISTORT_MAX_ITERS {
            let residual: Vector2<f64> = self.distort(p) - distorted;
            if residual.norm() < UNDISTORT_EPS {
                return Ok(p);
            }
            let inv = self
                .jacobian(p)
                .try_inverse()
                .ok_or(ModelError::UndistortDiverged {
                    iterations: UNDISTORT_MAX_ITERS,
                })?;
            let step = inv * residual;
            p -= step;
            if step.norm() < UNDISTORT_EPS {
                return Ok(p);
            }
        }

        // Newton stalls at ~1 ulp for well-behaved lenses; accept anything that
        // reproduces the observation to sub-nanometre precision.
        if (self.distort(p) - distorted).norm() < 1e-10 {
            Ok(p)
        } else {
            Err(ModelError::UndistortDiverged {
                iterations: UNDISTORT_MAX_ITERS,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn lens() -> Distortion {
        Distortion {
            k1: -0.28,
            k2: 0.09,
            p1: 0.0012,
            p2: -0.0007,
            k3: -0.01,
        }
    }

    #[test]
    fn zero_distortion_is_identity() {
        let p = Point2::new(0.3, -0.2);
        assert_eq!(Distortion::ZERO.distort(p), p);
        assert_eq!(Distortion::ZERO.undistort(p).unwrap(), p);
    }

    #[test]
    fn hand_computed_tangential_terms() {
        let d = Distortion {
            k1: 0.1,
            k2: 0.0,
            p1: 0.01,
            p2: 0.02,
            k3: 0.0,
        };
        let out = d.distort(Point2::new(0.1, 0.2));
        assert_abs_diff_eq!(out.x, 0.1023, epsilon = 1e-12);
        assert_abs_diff_eq!(out.y, 0.2031, epsilon = 1e-12);
    }

    #[test]
    fn undistort_inverts_distort() {
        let d = lens();
        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(0.25, -0.1),
            Point2::new(-0.4, 0.3),
            Point2::new(0.05, 0.45),
        ] {
            let back = d.undistort(d.distort(p)).expect("converges");
            assert_abs_diff_eq!(back.x, p.x, epsilon = 1e-10);
            assert_abs_diff_eq!(back.y, p.y, epsilon = 1e-10);
        }
    }

    #[test]
    fn from_slice_pads_and_truncates() {
        assert_eq!(Distortion::from_slice(&[0.1]).to_array(), [0.1, 0.0, 0.0, 0.0, 0.0]);
        let long = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        assert_eq!(Distortion::from_slice(&long).to_array(), [1.0, 2.0, 3.0, 4.0, 5.0]);
    }
}
