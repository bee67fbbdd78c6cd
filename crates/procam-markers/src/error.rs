use procam_core::ErrorKind;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("canvas {width}x{height} with marker size {marker_size} is empty")]
    EmptyCanvas {
        width: u32,
        height: u32,
        marker_size: u32,
    },
    #[error("marker id {id} is not available (renderer has {available} ids)")]
    UnknownMarkerId { id: u32, available: usize },
    #[error("dictionary marker size {marker_size} does not fit a 64-bit code")]
    UnsupportedMarkerSize { marker_size: usize },
    #[error("marker ids starting at {first_id} run past u32::MAX")]
    IdOverflow { first_id: u32 },
}

impl LayoutError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LayoutError::EmptyCanvas { .. }
            | LayoutError::UnknownMarkerId { .. }
            | LayoutError::IdOverflow { .. } => ErrorKind::InsufficientData,
            LayoutError::UnsupportedMarkerSize { .. } => ErrorKind::Io,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum MarkerIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Png(#[from] png::EncodingError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

impl MarkerIoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MarkerIoError::Layout(e) => e.kind(),
            _ => ErrorKind::Io,
        }
    }
}
