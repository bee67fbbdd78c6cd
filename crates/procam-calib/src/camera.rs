//! Interactive camera calibration from a calibration board.
//!
//! Every frame is previewed through the board detector. A captured frame
//! with enough marker ids becomes one view of board-to-image
//! correspondences; once more than `recompute_after` views exist, every new
//! capture re-solves the camera over all of them. A failed solve is logged
//! and never discards collected views.

use std::path::Path;

use nalgebra::Point3;
use procam_core::{CameraModel, CorrespondenceAccumulator, CorrespondenceSet, GrayImage, ImageSize};
use procam_markers::{BoardDetection, BoardDetector};
use procam_solver::{CalibrationFlags, CameraSolver};

use crate::{CalibrationError, CalibrationResult, CameraCalibrationParams, FrameConsumer, Key};

/// What happened to one submitted frame.
#[derive(Debug)]
pub enum FrameOutcome {
    /// `take == false`: detection only.
    Preview,
    /// Not enough ids; the frame was discarded.
    Rejected(CalibrationError),
    /// Stored as a new view; `solve` is set when a solve was attempted.
    Captured { solve: Option<CalibrationResult> },
}

#[derive(Debug)]
pub struct FrameSummary {
    /// Marker ids detected in this frame.
    pub ids: usize,
    /// Views collected so far.
    pub captures: usize,
    pub outcome: FrameOutcome,
}

impl FrameSummary {
    pub fn is_captured(&self) -> bool {
        matches!(self.outcome, FrameOutcome::Captured { .. })
    }

    /// True when this frame triggered a solve that succeeded.
    pub fn solved(&self) -> bool {
        matches!(self.outcome, FrameOutcome::Captured { solve: Some(Ok(_)) })
    }
}

pub struct CameraCalibrationEngine<D, S> {
    detector: D,
    solver: S,
    params: CameraCalibrationParams,
    model: CameraModel,
    views: CorrespondenceAccumulator,
    image_size: Option<ImageSize>,
    last_detection: BoardDetection,
    last_frame: Option<GrayImage>,
}

impl<D: BoardDetector, S: CameraSolver> CameraCalibrationEngine<D, S> {
    pub fn new(detector: D, solver: S, params: CameraCalibrationParams) -> Self {
        Self {
            detector,
            solver,
            params,
            model: CameraModel::new(),
            views: CorrespondenceAccumulator::new(),
            image_size: None,
            last_detection: BoardDetection::default(),
            last_frame: None,
        }
    }

    pub fn params(&self) -> &CameraCalibrationParams {
        &self.params
    }

    pub fn model(&self) -> &CameraModel {
        &self.model
    }

    pub fn into_model(self) -> CameraModel {
        self.model
    }

    pub fn views(&self) -> &CorrespondenceAccumulator {
        &self.views
    }

    pub fn capture_count(&self) -> usize {
        self.views.view_count()
    }

    /// Detection of the most recent frame, captured or not.
    pub fn last_detection(&self) -> &BoardDetection {
        &self.last_detection
    }

    /// Drop every collected view and the current model.
    pub fn reset(&mut self) {
        self.views.clear();
        self.model = CameraModel::new();
    }

    /// Detect the board in `image`; with `take` also record it as a view.
    pub fn submit_frame(&mut self, image: &GrayImage, take: bool) -> FrameSummary {
        let size = ImageSize::new(image.height as u32, image.width as u32);
        self.image_size = Some(size);
        self.last_detection = self.detector.detect_board(&image.view());
        let ids = self.last_detection.id_count();

        let outcome = if !take {
            log::debug!("preview: {ids} ids");
            FrameOutcome::Preview
        } else if ids < self.params.min_marker_ids {
            log::warn!(
                "insufficient captured ids ({ids} < {})",
                self.params.min_marker_ids
            );
            FrameOutcome::Rejected(CalibrationError::TooFewMarkerIds {
                found: ids,
                needed: self.params.min_marker_ids,
            })
        } else {
            let offset = self.params.offset();
            let view: CorrespondenceSet = self
                .last_detection
                .object_points
                .iter()
                .zip(&self.last_detection.image_points)
                .map(|(o, i)| (Point3::from(o.coords + offset), *i))
                .collect();
            self.views.push_view(view);
            log::info!("{ids} ids {} captures", self.views.view_count());

            let solve = (self.views.view_count() > self.params.recompute_after).then(|| self.solve());
            FrameOutcome::Captured { solve }
        };

        FrameSummary {
            ids,
            captures: self.views.view_count(),
            outcome,
        }
    }

    /// Solve over every collected view. The model is replaced only on success.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "info", skip_all, fields(views = self.views.view_count()))
    )]
    pub fn solve(&mut self) -> CalibrationResult {
        let result = self.try_solve();
        match &result {
            Ok(model) => log::info!(
                "camera calibrated from {} views: fx={:.2} fy={:.2}",
                self.views.view_count(),
                model.matrix()[(0, 0)],
                model.matrix()[(1, 1)]
            ),
            Err(e) => log::warn!("calibration failed: {e}"),
        }
        result
    }

    fn try_solve(&mut self) -> CalibrationResult {
        let size = self.image_size.ok_or(CalibrationError::UnknownImageSize)?;
        let solution = self.solver.calibrate(
            self.views.views(),
            size,
            None,
            CalibrationFlags::default(),
        )?;
        self.model.set(
            Some(size),
            solution.matrix,
            Some(solution.distortion),
            solution.poses,
        );
        Ok(self.model.clone())
    }

    /// Solve once and, on success, write the model to `write_path` if set.
    ///
    /// Returns `Ok(false)` when the solve fails; only I/O errors are returned.
    pub fn compute(&mut self) -> Result<bool, CalibrationError> {
        if self.solve().is_err() {
            return Ok(false);
        }
        if let Some(path) = self.params.write_path.clone() {
            self.write(&path)?;
        }
        Ok(true)
    }

    /// Capture every frame in order, e.g. images loaded from disk.
    pub fn calibrate_frames<I>(&mut self, frames: I) -> Vec<FrameSummary>
    where
        I: IntoIterator<Item = GrayImage>,
    {
        frames
            .into_iter()
            .map(|frame| self.submit_frame(&frame, true))
            .collect()
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), CalibrationError> {
        if !self.model.is_valid() {
            return Err(CalibrationError::NotCalibrated);
        }
        let path = path.as_ref();
        log::info!("writing camera calibration to {}", path.display());
        self.model.write(path)?;
        Ok(())
    }
}

impl<D: BoardDetector, S: CameraSolver> FrameConsumer for CameraCalibrationEngine<D, S> {
    fn on_frame(&mut self, frame: &GrayImage) {
        self.submit_frame(frame, false);
        self.last_frame = Some(frame.clone());
    }

    fn on_key(&mut self, key: Key) -> bool {
        if !key.is_capture() {
            return false;
        }
        if let Some(frame) = self.last_frame.take() {
            self.submit_frame(&frame, true);
            self.last_frame = Some(frame);
        }
        true
    }

    fn on_stop(&mut self) {
        log::info!(
            "camera capture stopped: {} views, calibrated: {}",
            self.views.view_count(),
            self.model.is_valid()
        );
    }
}
