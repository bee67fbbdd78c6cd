//! Core geometry for projector/camera calibration.
//!
//! This crate holds the pieces every other `procam-*` crate builds on:
//! - [`CameraModel`]: pinhole + Brown–Conrady model with ordered poses,
//!   forward projection, inverse projection to a [`Ray`], and the degenerate
//!   planar-homography form used for single-surface projector calibration;
//! - YAML calibration files ([`CalibrationFile`]);
//! - planar [`Surface`]s and inclusive point-in-polygon containment;
//! - [`CorrespondenceSet`] / [`CorrespondenceAccumulator`] for solver input;
//! - a normalized-DLT [`Homography`] estimator and a plain [`GrayImage`].
//!
//! It does not depend on any detector, solver or device backend.

mod camera;
mod correspondence;
mod distortion;
mod error;
mod homography;
mod image;
pub mod io;
mod logger;
mod polygon;
mod ray;
mod surface;

pub use camera::{CameraModel, ImageSize, Pose};
pub use correspondence::{CorrespondenceAccumulator, CorrespondenceSet};
pub use distortion::Distortion;
pub use error::{ErrorKind, ModelError};
pub use homography::{estimate_homography, normalize_points, Homography};
pub use image::{GrayImage, GrayImageView};
pub use io::{CalibrationFile, CalibrationIoError};
pub use polygon::{contains_all_corners, point_in_polygon};
pub use ray::{Ray, PARALLEL_EPS};
pub use surface::{assign_to_first_containing, Surface, SurfaceError};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_from_env, init_with_level, level_from_str, LOG_ENV};
