//! Serializable summaries for calibration files and session configs.

use nalgebra::{Point2, Point3};
use procam_calib::{ConfigError, ProjectorSessionConfig};
use procam_core::{CameraModel, ErrorKind, ModelError, SurfaceError};
use procam_markers::{LayoutError, MarkerLayout, MarkerLayoutParams};
use serde::Serialize;

#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("surface {index}: {source}")]
    Surface {
        index: usize,
        #[source]
        source: SurfaceError,
    },
}

impl ReportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReportError::Config(e) => e.kind(),
            ReportError::Model(e) => e.kind(),
            ReportError::Layout(e) => e.kind(),
            ReportError::Surface { source, .. } => source.kind(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Pinhole,
    Homography,
}

impl ModelKind {
    pub fn of(model: &CameraModel) -> Self {
        if model.is_homography() {
            ModelKind::Homography
        } else {
            ModelKind::Pinhole
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PointProjection {
    pub model: ModelKind,
    pub world: [f64; 3],
    pub pixel: [f64; 2],
}

/// Project a world point in metres; homography models use `x, y` only.
pub fn project_point(model: &CameraModel, world: [f64; 3]) -> Result<PointProjection, ModelError> {
    let kind = ModelKind::of(model);
    let uv = match kind {
        ModelKind::Homography => model.project2d(&Point2::new(world[0], world[1]))?,
        ModelKind::Pinhole => model.project(&Point3::from(world))?,
    };
    Ok(PointProjection {
        model: kind,
        world,
        pixel: [uv.x, uv.y],
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PixelRay {
    pub model: ModelKind,
    pub pixel: [f64; 2],
    /// Camera centre; absent for homography models.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<[f64; 3]>,
    /// Point on the requested plane, or on `z = 0` for homography models.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point: Option<[f64; 3]>,
}

/// Back-project a pixel, optionally intersecting the ray with the plane `Z = z`.
pub fn unproject_pixel(
    model: &CameraModel,
    pixel: [f64; 2],
    z: Option<f64>,
) -> Result<PixelRay, ModelError> {
    let uv = Point2::new(pixel[0], pixel[1]);
    if model.is_homography() {
        let xy = model.unproject2d(&uv)?;
        return Ok(PixelRay {
            model: ModelKind::Homography,
            pixel,
            origin: None,
            direction: None,
            point: Some([xy.x, xy.y, 0.0]),
        });
    }

    let ray = model.unproject(&uv)?;
    let point = z
        .map(|z| model.ray_intersect_plane_z(&ray, z))
        .transpose()?;
    Ok(PixelRay {
        model: ModelKind::Pinhole,
        pixel,
        origin: Some(ray.origin.coords.into()),
        direction: Some(ray.direction.into_inner().into()),
        point: point.map(|p| p.coords.into()),
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SurfaceReport {
    pub index: usize,
    /// Reference points in metres.
    pub points: Vec<[f64; 3]>,
    pub normal: [f64; 3],
    /// Outline in camera pixels.
    pub outline: Vec<[f64; 2]>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionReport {
    pub screen: u32,
    pub camera: String,
    pub camera_size: Option<[u32; 2]>,
    pub surfaces: Vec<SurfaceReport>,
    /// Markers on a canvas of the requested size, if one was given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markers: Option<usize>,
}

/// Load the camera model and surfaces named by `config` and summarize them.
///
/// With `canvas = Some((width, height))` the marker count of that projector
/// canvas is included.
pub fn inspect_session(
    config: &ProjectorSessionConfig,
    canvas: Option<(u32, u32)>,
) -> Result<SessionReport, ReportError> {
    let camera = config.load_camera_model()?;
    let selection = config.camera_selection()?;

    let surfaces = config
        .surfaces()?
        .iter()
        .enumerate()
        .map(|(index, surface)| {
            let wrap = |source| ReportError::Surface { index, source };
            let normal = surface.normal().map_err(wrap)?;
            let outline = surface.project_corners(&camera).map_err(wrap)?;
            Ok(SurfaceReport {
                index,
                points: surface.points().iter().map(|p| p.coords.into()).collect(),
                normal: normal.into(),
                outline: outline.iter().map(|p| [p.x, p.y]).collect(),
            })
        })
        .collect::<Result<Vec<_>, ReportError>>()?;

    let markers = canvas
        .map(|(w, h)| {
            let params = MarkerLayoutParams::new(w, h)
                .with_marker_size(config.marker_size)
                .with_omit(config.omit.iter().copied());
            MarkerLayout::compute(params).map(|l| l.registry().len())
        })
        .transpose()?;

    log::debug!(
        "session: {} surfaces, camera {:?}",
        surfaces.len(),
        selection
    );
    Ok(SessionReport {
        screen: config.screen,
        camera: selection.to_string(),
        camera_size: camera.image_size().map(|s| [s.width(), s.height()]),
        surfaces,
        markers,
    })
}
