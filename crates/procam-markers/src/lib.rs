//! Fiducial-marker canvases for projector calibration.
//!
//! A projector shows a canvas tiled with markers; the camera sees them on the
//! physical surfaces. This crate provides:
//! - the deterministic [`MarkerLayout`] and [`generate`] (canvas + [`MarkerRegistry`]),
//! - single-marker rasterizers behind [`MarkerRenderer`],
//! - the [`MarkerDetector`] / [`BoardDetector`] contracts implemented by
//!   external vision backends,
//! - PNG export of canvases.
//!
//! It does **not** detect markers itself.

mod detection;
mod dictionary;
mod error;
pub mod export;
mod layout;
mod registry;
mod render;

pub use detection::{BoardDetection, BoardDetector, MarkerDetection, MarkerDetector};
pub use dictionary::{code_bit, Dictionary};
pub use error::{LayoutError, MarkerIoError};
pub use export::{encode_png, write_png};
pub use layout::{
    generate, MarkerLayout, MarkerLayoutParams, MarkerSlot, DEFAULT_MARKER_SIZE, FIRST_MARKER_ID,
};
pub use registry::{MarkerCorners, MarkerRegistry};
pub use render::{render_code, DictionaryRenderer, IdBitsRenderer, MarkerRenderer, BLACK, WHITE};
