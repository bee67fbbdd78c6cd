use procam_core::{CalibrationIoError, CameraModel, ErrorKind, ModelError, SurfaceError};
use procam_markers::LayoutError;
use procam_solver::SolverError;

use crate::ConfigError;

/// Outcome of one solve attempt.
pub type CalibrationResult = Result<CameraModel, CalibrationError>;

#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("frame has {found} marker ids, at least {needed} are required")]
    TooFewMarkerIds { found: usize, needed: usize },
    #[error("no frame has been seen yet, image size is unknown")]
    UnknownImageSize,
    #[error("no world/image correspondences were collected")]
    NoCorrespondences,
    #[error("markers have not been projected")]
    MarkersNotProjected,
    #[error("calibration session has been terminated")]
    Terminated,
    #[error("no valid calibration to write")]
    NotCalibrated,
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Io(#[from] CalibrationIoError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CalibrationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CalibrationError::TooFewMarkerIds { .. }
            | CalibrationError::UnknownImageSize
            | CalibrationError::NoCorrespondences => ErrorKind::InsufficientData,
            CalibrationError::MarkersNotProjected
            | CalibrationError::Terminated
            | CalibrationError::NotCalibrated => ErrorKind::InvalidState,
            CalibrationError::Solver(e) => e.kind(),
            CalibrationError::Model(e) => e.kind(),
            CalibrationError::Surface(e) => e.kind(),
            CalibrationError::Layout(e) => e.kind(),
            CalibrationError::Io(e) => e.kind(),
            CalibrationError::Config(e) => e.kind(),
        }
    }
}
