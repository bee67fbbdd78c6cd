//! High-level facade crate for the `procam-*` workspace.
//!
//! This crate provides:
//! - stable re-exports of the underlying crates;
//! - [`report`]: serializable summaries of a session config, a point
//!   projection or a pixel back-projection, used by the `procam` binary.
//!
//! ## Quickstart
//!
//! ```no_run
//! use procam::core::CameraModel;
//! use procam::report;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let projector = CameraModel::read("projector.yaml")?;
//! let uv = report::project_point(&projector, [0.1, 0.2, 0.0])?;
//! println!("{:.1} {:.1}", uv.pixel[0], uv.pixel[1]);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `procam::core`: camera model, calibration files, surfaces, correspondences.
//! - `procam::markers`: marker canvas layout, registry and detector traits.
//! - `procam::solver`: camera and homography solver traits and solvers.
//! - `procam::calib`: camera/projector calibration engines and the capture loop.

pub use procam_calib as calib;
pub use procam_core as core;
pub use procam_markers as markers;
pub use procam_solver as solver;

pub use procam_calib::{
    CameraCalibrationEngine, CameraCalibrationParams, ProjectorCalibrationEngine,
    ProjectorSessionConfig, Streamer,
};
pub use procam_core::{CameraModel, ErrorKind, Surface};
pub use procam_markers::{generate, MarkerLayoutParams, MarkerRegistry};

pub mod report;
