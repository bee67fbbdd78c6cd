//! Projector calibration against known planar surfaces.
//!
//! The projector shows a marker canvas; a calibrated camera sees the markers
//! land on one or more surfaces with known world coordinates. Each detected
//! marker corner is unprojected through the camera, intersected with its
//! surface, and paired with the canvas corner it was drawn at. Those
//! world/canvas pairs form a single view that is solved as a full projector
//! model (several surfaces) or a plane homography (one surface).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use nalgebra::{Matrix3, Point2};
use procam_core::{
    assign_to_first_containing, CameraModel, CorrespondenceSet, ErrorKind, GrayImage, ImageSize,
    Surface,
};
use procam_markers::{
    generate, MarkerDetection, MarkerDetector, MarkerLayoutParams, MarkerRegistry, MarkerRenderer,
    DEFAULT_MARKER_SIZE,
};
use procam_solver::{CalibrationFlags, CameraSolver, HomographySolver};

use crate::{
    CalibrationError, CalibrationResult, ConfigError, FrameConsumer, Key, ProjectorSessionConfig,
};

/// Full-screen output the projector is attached to.
pub trait Display {
    /// `(width, height)` in pixels.
    fn resolution(&self) -> (u32, u32);

    fn present(&mut self, canvas: &GrayImage);
}

impl<T: Display + ?Sized> Display for &mut T {
    fn resolution(&self) -> (u32, u32) {
        (**self).resolution()
    }

    fn present(&mut self, canvas: &GrayImage) {
        (**self).present(canvas)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProjectorState {
    Idle,
    MarkersProjected,
    Capturing,
    ComputeRequested,
    Valid,
    Failed,
    Terminated,
}

/// Markers of one frame, grouped by the surface that contains them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurfaceDetections {
    per_surface: Vec<Vec<MarkerDetection>>,
    unassigned: usize,
}

impl SurfaceDetections {
    pub fn new(surface_count: usize) -> Self {
        Self {
            per_surface: vec![Vec::new(); surface_count],
            unassigned: 0,
        }
    }

    /// Markers assigned to surface `index`, in detection order.
    pub fn surface(&self, index: usize) -> &[MarkerDetection] {
        self.per_surface.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn surface_count(&self) -> usize {
        self.per_surface.len()
    }

    pub fn assigned(&self) -> usize {
        self.per_surface.iter().map(Vec::len).sum()
    }

    /// Markers that fell outside every surface outline.
    pub fn unassigned(&self) -> usize {
        self.unassigned
    }

    pub fn iter(&self) -> impl Iterator<Item = &[MarkerDetection]> + '_ {
        self.per_surface.iter().map(Vec::as_slice)
    }
}

pub struct ProjectorCalibrationEngine<M, S, H> {
    detector: M,
    camera_solver: S,
    homography_solver: H,
    camera: CameraModel,
    surfaces: Vec<Surface>,
    marker_size: u32,
    omit: BTreeSet<u32>,
    write_path: Option<PathBuf>,
    registry: MarkerRegistry,
    model: CameraModel,
    state: ProjectorState,
    latest: SurfaceDetections,
}

impl<M, S, H> ProjectorCalibrationEngine<M, S, H>
where
    M: MarkerDetector,
    S: CameraSolver,
    H: HomographySolver,
{
    /// `camera` must be a calibrated model with at least one pose.
    pub fn new(
        camera: CameraModel,
        surfaces: Vec<Surface>,
        detector: M,
        camera_solver: S,
        homography_solver: H,
    ) -> Self {
        let latest = SurfaceDetections::new(surfaces.len());
        Self {
            detector,
            camera_solver,
            homography_solver,
            camera,
            surfaces,
            marker_size: DEFAULT_MARKER_SIZE,
            omit: BTreeSet::new(),
            write_path: None,
            registry: MarkerRegistry::new(),
            model: CameraModel::new(),
            state: ProjectorState::Idle,
            latest,
        }
    }

    /// Engine for a session config: reads the camera calibration and the
    /// surfaces, and takes over marker size, omitted ids and output path.
    pub fn from_config(
        config: &ProjectorSessionConfig,
        detector: M,
        camera_solver: S,
        homography_solver: H,
    ) -> Result<Self, ConfigError> {
        let camera = config.load_camera_model()?;
        let surfaces = config.surfaces()?;
        Ok(Self::new(camera, surfaces, detector, camera_solver, homography_solver)
            .with_marker_size(config.marker_size)
            .with_omit(config.omit.iter().copied())
            .with_write_path(config.write.clone()))
    }

    pub fn with_marker_size(mut self, marker_size: u32) -> Self {
        self.marker_size = marker_size;
        self
    }

    pub fn with_omit(mut self, omit: impl IntoIterator<Item = u32>) -> Self {
        self.omit = omit.into_iter().collect();
        self
    }

    pub fn with_write_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.write_path = Some(path.into());
        self
    }

    pub fn state(&self) -> ProjectorState {
        self.state
    }

    pub fn camera(&self) -> &CameraModel {
        &self.camera
    }

    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    pub fn registry(&self) -> &MarkerRegistry {
        &self.registry
    }

    /// The projector model; valid after a successful compute.
    pub fn model(&self) -> &CameraModel {
        &self.model
    }

    pub fn latest_detections(&self) -> &SurfaceDetections {
        &self.latest
    }

    fn ensure_live(&self) -> Result<(), CalibrationError> {
        match self.state {
            ProjectorState::Terminated => Err(CalibrationError::Terminated),
            ProjectorState::Idle => Err(CalibrationError::MarkersNotProjected),
            _ => Ok(()),
        }
    }

    /// Generate the marker canvas for the display and present it.
    pub fn project_markers<D, R>(
        &mut self,
        display: &mut D,
        renderer: &R,
    ) -> Result<&MarkerRegistry, CalibrationError>
    where
        D: Display + ?Sized,
        R: MarkerRenderer + ?Sized,
    {
        if self.state == ProjectorState::Terminated {
            return Err(CalibrationError::Terminated);
        }
        let (width, height) = display.resolution();
        let params = MarkerLayoutParams::new(width, height)
            .with_marker_size(self.marker_size)
            .with_omit(self.omit.iter().copied());
        let (canvas, registry) = generate(params, renderer)?;

        self.model.set_image_size(ImageSize::new(height, width));
        self.registry = registry;
        display.present(&canvas);
        self.state = ProjectorState::MarkersProjected;
        log::info!(
            "projected {} markers on a {width}x{height} canvas",
            self.registry.len()
        );
        Ok(&self.registry)
    }

    /// Surface outlines in the camera image, rounded to whole pixels.
    pub fn surface_outlines(&self) -> Result<Vec<Vec<Point2<f64>>>, CalibrationError> {
        self.surfaces
            .iter()
            .map(|s| s.project_corners(&self.camera).map_err(CalibrationError::from))
            .collect()
    }

    /// Detect markers in a camera frame and assign each to the first surface
    /// whose outline contains all of its corners.
    pub fn process_frame(&mut self, image: &GrayImage) -> Result<SurfaceDetections, CalibrationError> {
        self.ensure_live()?;
        let outlines = self.surface_outlines()?;

        let mut detections = SurfaceDetections::new(self.surfaces.len());
        for marker in self.detector.detect(&image.view()) {
            match assign_to_first_containing(&outlines, &marker.corners) {
                Some(index) => detections.per_surface[index].push(marker),
                None => detections.unassigned += 1,
            }
        }
        log::debug!(
            "frame: {} markers on surfaces, {} elsewhere",
            detections.assigned(),
            detections.unassigned
        );

        self.latest = detections.clone();
        self.state = ProjectorState::Capturing;
        Ok(detections)
    }

    /// World/canvas pairs for every registered marker corner, and the number
    /// of surfaces that contributed at least one pair.
    fn correspondences(
        &self,
        detections: &SurfaceDetections,
    ) -> Result<(CorrespondenceSet, usize), CalibrationError> {
        self.camera.current_pose()?;

        let mut view = CorrespondenceSet::new();
        let mut contributing = 0;
        for (surface, markers) in self.surfaces.iter().zip(detections.iter()) {
            let before = view.len();
            for marker in markers {
                let Some(canvas) = self.registry.get(marker.id) else {
                    log::debug!("marker {} is not in the projected layout", marker.id);
                    continue;
                };
                for (detected, projected) in marker.corners.iter().zip(canvas) {
                    let world = self
                        .camera
                        .unproject(detected)
                        .map_err(CalibrationError::from)
                        .and_then(|ray| surface.intersect(&ray).map_err(CalibrationError::from));
                    match world {
                        Ok(w) => view.push(w, *projected),
                        Err(e) if e.kind() == ErrorKind::DegenerateGeometry => {
                            log::debug!("skipping corner of marker {}: {e}", marker.id);
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
            if view.len() > before {
                contributing += 1;
            }
        }
        Ok((view, contributing))
    }

    fn solve(&self, view: CorrespondenceSet, contributing: usize) -> CalibrationResult {
        if view.is_empty() {
            return Err(CalibrationError::NoCorrespondences);
        }
        let size = self
            .model
            .image_size()
            .ok_or(CalibrationError::MarkersNotProjected)?;

        if contributing > 1 {
            let w = f64::from(size.width());
            let h = f64::from(size.height());
            let guess = Matrix3::new(w / 2.0, 0.0, w / 2.0, 0.0, h / 2.0, h / 2.0, 0.0, 0.0, 1.0);
            let solution = self.camera_solver.calibrate(
                std::slice::from_ref(&view),
                size,
                Some(&guess),
                CalibrationFlags::projector(),
            )?;
            log::info!(
                "projector solved from {} points on {contributing} surfaces, rms {:.3}px",
                view.len(),
                solution.rms
            );
            Ok(CameraModel::from_parts(
                Some(size),
                solution.matrix,
                Some(solution.distortion),
                solution.poses,
            ))
        } else {
            let plane: Vec<Point2<f64>> = view
                .world_points()
                .iter()
                .map(|p| Point2::new(p.x, p.y))
                .collect();
            let solution = self
                .homography_solver
                .find_homography(&plane, view.image_points())?;
            log::info!(
                "projector homography from {} points ({} inliers)",
                view.len(),
                solution.inlier_count()
            );
            Ok(CameraModel::homography(Some(size), solution.matrix))
        }
    }

    /// Solve the projector from one frame's detections. On failure the
    /// previous model is kept.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "info", skip_all, fields(markers = detections.assigned()))
    )]
    pub fn compute_calibration(&mut self, detections: &SurfaceDetections) -> CalibrationResult {
        self.ensure_live()?;
        self.state = ProjectorState::ComputeRequested;

        let result = self
            .correspondences(detections)
            .and_then(|(view, contributing)| self.solve(view, contributing));
        match &result {
            Ok(model) => {
                self.model = model.clone();
                self.state = ProjectorState::Valid;
            }
            Err(e) => {
                log::warn!("projector calibration failed: {e}");
                self.state = ProjectorState::Failed;
            }
        }
        result
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), CalibrationError> {
        if !self.model.is_valid() {
            return Err(CalibrationError::NotCalibrated);
        }
        let path = path.as_ref();
        log::info!("writing projector calibration to {}", path.display());
        self.model.write(path)?;
        Ok(())
    }

    /// End the session; later frames and computes are refused.
    pub fn terminate(&mut self) {
        self.state = ProjectorState::Terminated;
    }
}

impl<M, S, H> FrameConsumer for ProjectorCalibrationEngine<M, S, H>
where
    M: MarkerDetector,
    S: CameraSolver,
    H: HomographySolver,
{
    fn on_frame(&mut self, frame: &GrayImage) {
        if let Err(e) = self.process_frame(frame) {
            log::warn!("frame skipped: {e}");
        }
    }

    fn on_key(&mut self, key: Key) -> bool {
        if key != Key::Space {
            return false;
        }
        let detections = self.latest.clone();
        if self.compute_calibration(&detections).is_ok() {
            if let Some(path) = self.write_path.clone() {
                if let Err(e) = self.write(&path) {
                    log::error!("unable to write projector calibration: {e}");
                }
            }
        }
        true
    }

    fn on_stop(&mut self) {
        self.terminate();
    }
}
