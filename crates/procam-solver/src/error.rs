use procam_core::{ErrorKind, ModelError};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("no calibration views")]
    NoViews,
    #[error("need at least {needed} point correspondences, got {got}")]
    NotEnoughPoints { needed: usize, got: usize },
    #[error("mismatched number of world points ({world}) and image points ({image})")]
    MismatchedPoints { world: usize, image: usize },
    #[error("degenerate point configuration: {0}")]
    Degenerate(&'static str),
    #[error("cannot determine intrinsics: {0}")]
    NoIntrinsics(&'static str),
    #[error("singular value decomposition failed")]
    SvdFailed,
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl SolverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SolverError::NoViews | SolverError::NotEnoughPoints { .. } => {
                ErrorKind::InsufficientData
            }
            SolverError::Degenerate(_) => ErrorKind::DegenerateGeometry,
            SolverError::MismatchedPoints { .. }
            | SolverError::NoIntrinsics(_)
            | SolverError::SvdFailed
            | SolverError::Model(_) => ErrorKind::SolverFailure,
        }
    }
}
