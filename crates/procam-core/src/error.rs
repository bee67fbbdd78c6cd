//! Error taxonomy shared by every crate of the workspace.
//!
//! Each crate defines its own `thiserror` enum per concern; all of them map
//! onto the coarse [`ErrorKind`] so that capture loops can decide how to react
//! (skip the frame, keep collecting, abort one operation) without matching on
//! every concrete variant.

use serde::{Deserialize, Serialize};

/// Coarse error classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The operation needs a solved model (or a pose) that does not exist yet.
    InvalidState,
    /// Fewer detections/correspondences than the operation requires.
    InsufficientData,
    /// A numerical solver returned failure.
    SolverFailure,
    /// Parallel ray, colinear reference points, singular matrix.
    DegenerateGeometry,
    /// File read/write or parse failure.
    Io,
}

/// Errors produced by [`crate::CameraModel`] and [`crate::Ray`] operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("camera model is not calibrated")]
    NotCalibrated,
    #[error("camera model has no extrinsic pose")]
    NoPose,
    #[error("ray is parallel to the target plane")]
    ParallelRay,
    #[error("point lies on the camera plane (z = {z})")]
    OnCameraPlane { z: f64 },
    #[error("camera matrix is not invertible")]
    SingularMatrix,
    #[error("undistortion did not converge after {iterations} iterations")]
    UndistortDiverged { iterations: u32 },
}

impl ModelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::NotCalibrated | ModelError::NoPose => ErrorKind::InvalidState,
            ModelError::ParallelRay
            | ModelError::OnCameraPlane { .. }
            | ModelError::SingularMatrix
            | ModelError::UndistortDiverged { .. } => ErrorKind::DegenerateGeometry,
        }
    }
}
