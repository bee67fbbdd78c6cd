//! Calibration engines for a camera and a projector.
//!
//! - [`CameraCalibrationEngine`] accumulates calibration-board views and
//!   solves the camera whenever enough captures exist;
//! - [`ProjectorCalibrationEngine`] projects a marker canvas, lifts detected
//!   marker corners onto known surfaces through the calibrated camera and
//!   solves the projector;
//! - [`Streamer`] drives either engine frame by frame through the
//!   [`FrameConsumer`] trait.
//!
//! Detectors, solvers, displays, frame and key sources are traits; this crate
//! talks to no hardware.
//!
//! ```no_run
//! use procam_calib::{CameraCalibrationEngine, CameraCalibrationParams};
//! use procam_markers::{BoardDetection, BoardDetector};
//! use procam_solver::LinearCameraSolver;
//! # struct MyBoard;
//! # impl BoardDetector for MyBoard {
//! #     fn detect_board(&self, _: &procam_core::GrayImageView<'_>) -> BoardDetection {
//! #         BoardDetection::default()
//! #     }
//! # }
//! # let frames: Vec<procam_core::GrayImage> = Vec::new();
//!
//! let mut engine = CameraCalibrationEngine::new(
//!     MyBoard,
//!     LinearCameraSolver::default(),
//!     CameraCalibrationParams::default(),
//! );
//! engine.calibrate_frames(frames);
//! if engine.compute()? {
//!     println!("fx = {}", engine.model().matrix()[(0, 0)]);
//! }
//! # Ok::<(), procam_calib::CalibrationError>(())
//! ```

mod camera;
mod config;
mod device;
mod error;
mod projector;
mod stream;

pub use camera::{CameraCalibrationEngine, FrameOutcome, FrameSummary};
pub use config::{CameraCalibrationParams, ConfigError, ProjectorSessionConfig};
pub use device::{
    open_camera, Backend, BackendRequirement, CameraBackend, CameraSelection, CameraSpec,
    Capabilities, DeviceError,
};
pub use error::{CalibrationError, CalibrationResult};
pub use projector::{Display, ProjectorCalibrationEngine, ProjectorState, SurfaceDetections};
pub use stream::{
    FrameConsumer, FrameSource, IterFrames, Key, KeySource, NoKeys, ScriptedKeys, StopReason,
    StreamStats, Streamer,
};
