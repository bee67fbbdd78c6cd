use nalgebra::Point2;
use procam_core::estimate_homography;

use crate::{HomographySolution, HomographySolver, SolverError};

/// Least-squares homography over all correspondences.
#[derive(Clone, Copy, Debug)]
pub struct DltHomographySolver {
    /// Reprojection distance (pixels) below which a pair counts as inlier.
    pub inlier_threshold: f64,
}

impl Default for DltHomographySolver {
    fn default() -> Self {
        Self {
            inlier_threshold: 3.0,
        }
    }
}

impl HomographySolver for DltHomographySolver {
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "info", skip_all, fields(points = world.len()))
    )]
    fn find_homography(
        &self,
        world: &[Point2<f64>],
        image: &[Point2<f64>],
    ) -> Result<HomographySolution, SolverError> {
        if world.len() != image.len() {
            return Err(SolverError::MismatchedPoints {
                world: world.len(),
                image: image.len(),
            });
        }
        if world.len() < 4 {
            return Err(SolverError::NotEnoughPoints {
                needed: 4,
                got: world.len(),
            });
        }

        let h = estimate_homography(world, image)
            .ok_or(SolverError::Degenerate("points do not span a plane"))?;

        let inliers = world
            .iter()
            .zip(image)
            .map(|(w, i)| {
                let p = h.apply(*w);
                let err = (p - *i).norm();
                err.is_finite() && err <= self.inlier_threshold
            })
            .collect::<Vec<_>>();

        let solution = HomographySolution {
            matrix: h.h,
            inliers,
        };
        log::debug!(
            "homography from {} points, {} inliers",
            world.len(),
            solution.inlier_count()
        );
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use procam_core::Homography;

    #[test]
    fn fits_and_flags_outliers() {
        let h = Homography::from_array([[2.0, 0.1, 100.0], [0.05, 1.8, 50.0], [1e-4, 2e-4, 1.0]]);
        let world: Vec<_> = (0..16)
            .map(|i| Point2::new((i % 4) as f64 * 100.0, (i / 4) as f64 * 80.0))
            .collect();
        let mut image: Vec<_> = world.iter().map(|p| h.apply(*p)).collect();

        let sol = DltHomographySolver::default()
            .find_homography(&world, &image)
            .unwrap();
        assert_eq!(sol.inlier_count(), 16);
        assert_abs_diff_eq!(sol.matrix, h.h, epsilon = 1e-6);

        image[5].x += 40.0;
        let sol = DltHomographySolver::default()
            .find_homography(&world, &image)
            .unwrap();
        assert!(!sol.inliers[5]);
    }

    #[test]
    fn rejects_short_input() {
        let pts = vec![Point2::origin(); 3];
        let err = DltHomographySolver::default()
            .find_homography(&pts, &pts)
            .unwrap_err();
        assert_eq!(err, SolverError::NotEnoughPoints { needed: 4, got: 3 });
    }
}
