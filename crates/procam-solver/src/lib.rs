//! Solver contracts and linear solvers for camera and projector calibration.
//!
//! Engines only see the [`CameraSolver`] and [`HomographySolver`] traits. The
//! implementations shipped here are closed-form:
//!
//! - [`LinearCameraSolver`]: per-view DLT or plane homographies, intrinsics
//!   from a non-coplanar view, Zhang's method or an initial guess, then a
//!   linear distortion fit alternated with pose re-estimation;
//! - [`DltHomographySolver`]: Hartley-normalized DLT homography.
//!
//! No non-linear refinement is performed.

pub mod distortion_fit;
pub mod dlt;
mod error;
mod homography;
mod linear;
pub mod math;
pub mod pose;
pub mod zhang;

use nalgebra::{Matrix3, Point2};
use procam_core::{CorrespondenceSet, Distortion, ImageSize, Pose};
use serde::{Deserialize, Serialize};

pub use error::SolverError;
pub use homography::DltHomographySolver;
pub use linear::LinearCameraSolver;

/// Options for [`CameraSolver::calibrate`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationFlags {
    /// Use the supplied initial matrix when the views do not determine `K`.
    pub use_intrinsic_guess: bool,
    pub fix_k2: bool,
    pub fix_k3: bool,
    pub fix_tangential: bool,
}

impl CalibrationFlags {
    /// Flags for a projector solved from a single multi-surface view.
    pub fn projector() -> Self {
        Self {
            use_intrinsic_guess: true,
            fix_k2: true,
            fix_k3: true,
            fix_tangential: false,
        }
    }
}

/// Result of a successful camera calibration.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraSolution {
    pub matrix: Matrix3<f64>,
    pub distortion: Distortion,
    /// One pose per input view, in input order.
    pub poses: Vec<Pose>,
    /// RMS reprojection error in pixels.
    pub rms: f64,
}

/// Result of a successful homography fit.
#[derive(Clone, Debug, PartialEq)]
pub struct HomographySolution {
    pub matrix: Matrix3<f64>,
    /// Per-correspondence inlier flag.
    pub inliers: Vec<bool>,
}

impl HomographySolution {
    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|b| **b).count()
    }
}

/// Full intrinsic + extrinsic calibration from world/image correspondences.
pub trait CameraSolver {
    fn calibrate(
        &self,
        views: &[CorrespondenceSet],
        image_size: ImageSize,
        initial_matrix: Option<&Matrix3<f64>>,
        flags: CalibrationFlags,
    ) -> Result<CameraSolution, SolverError>;
}

/// Plane-to-image homography fit.
pub trait HomographySolver {
    fn find_homography(
        &self,
        world: &[Point2<f64>],
        image: &[Point2<f64>],
    ) -> Result<HomographySolution, SolverError>;
}

impl<T: CameraSolver + ?Sized> CameraSolver for &T {
    fn calibrate(
        &self,
        views: &[CorrespondenceSet],
        image_size: ImageSize,
        initial_matrix: Option<&Matrix3<f64>>,
        flags: CalibrationFlags,
    ) -> Result<CameraSolution, SolverError> {
        (**self).calibrate(views, image_size, initial_matrix, flags)
    }
}

impl<T: HomographySolver + ?Sized> HomographySolver for &T {
    fn find_homography(
        &self,
        world: &[Point2<f64>],
        image: &[Point2<f64>],
    ) -> Result<HomographySolution, SolverError> {
        (**self).find_homography(world, image)
    }
}
