//! JSON configuration for calibration sessions.

use std::fs;
use std::path::{Path, PathBuf};

use nalgebra::Vector3;
use procam_core::{CalibrationIoError, CameraModel, ErrorKind, Surface, SurfaceError};
use procam_markers::DEFAULT_MARKER_SIZE;
use serde::{Deserialize, Serialize};

use crate::{CameraSelection, CameraSpec, DeviceError};

const MM_TO_M: f64 = 0.001;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("surface {index}: {source}")]
    Surface {
        index: usize,
        #[source]
        source: SurfaceError,
    },
    #[error(transparent)]
    Camera(#[from] DeviceError),
    #[error("camera calibration: {0}")]
    Calibration(#[from] CalibrationIoError),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::Surface { source, .. } => source.kind(),
            ConfigError::Camera(e) => e.kind(),
            ConfigError::Io(_)
            | ConfigError::Json(_)
            | ConfigError::Invalid { .. }
            | ConfigError::Calibration(_) => ErrorKind::Io,
        }
    }
}

fn default_marker_size() -> u32 {
    DEFAULT_MARKER_SIZE
}

/// Projector calibration session, as written by the operator.
///
/// ```json
/// {
///   "screen": 2,
///   "camera": "P1",
///   "camera-calibration": "camera.yaml",
///   "write": "projector.yaml",
///   "surfaces": [[[0, 0, 0], [400, 0, 0], [400, 300, 0], [0, 300, 0]]]
/// }
/// ```
///
/// Surface points are in millimetres; file paths are relative to the config
/// file and are resolved by [`ProjectorSessionConfig::load_json`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectorSessionConfig {
    /// 1-based display number for the projector.
    pub screen: u32,
    pub camera: CameraSpec,
    /// Rotate the preview by 180 degrees. Display only.
    #[serde(default)]
    pub invert: bool,
    pub camera_calibration: PathBuf,
    pub write: PathBuf,
    pub surfaces: Vec<Vec<[f64; 3]>>,
    #[serde(default = "default_marker_size")]
    pub marker_size: u32,
    #[serde(default)]
    pub omit: Vec<u32>,
}

impl ProjectorSessionConfig {
    /// Parse and validate; paths are left as written.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load, validate and resolve relative paths against the file's directory.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let mut config = Self::from_json_str(&raw)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.resolve_paths(base);
        log::debug!(
            "loaded session config {} ({} surfaces)",
            path.display(),
            config.surfaces.len()
        );
        Ok(config)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Make relative paths relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for p in [&mut self.camera_calibration, &mut self.write] {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.screen == 0 {
            return Err(ConfigError::Invalid {
                field: "screen",
                reason: "displays are numbered from 1".into(),
            });
        }
        if self.marker_size == 0 {
            return Err(ConfigError::Invalid {
                field: "marker-size",
                reason: "must be at least 1 pixel".into(),
            });
        }
        if self.surfaces.is_empty() {
            return Err(ConfigError::Invalid {
                field: "surfaces",
                reason: "at least one surface is required".into(),
            });
        }
        if let Some(bad) = self
            .surfaces
            .iter()
            .flatten()
            .flatten()
            .find(|v| !v.is_finite())
        {
            return Err(ConfigError::Invalid {
                field: "surfaces",
                reason: format!("non-finite coordinate {bad}"),
            });
        }
        self.camera_selection()?;
        self.surfaces()?;
        Ok(())
    }

    pub fn camera_selection(&self) -> Result<CameraSelection, ConfigError> {
        Ok(CameraSelection::try_from(&self.camera)?)
    }

    /// Surfaces in metres, each with a well-defined normal.
    pub fn surfaces(&self) -> Result<Vec<Surface>, ConfigError> {
        self.surfaces
            .iter()
            .enumerate()
            .map(|(index, pts)| {
                let surface = Surface::from_millimeters(pts)
                    .map_err(|source| ConfigError::Surface { index, source })?;
                surface
                    .normal()
                    .map_err(|source| ConfigError::Surface { index, source })?;
                Ok(surface)
            })
            .collect()
    }

    /// Read the pre-solved camera model named by `camera-calibration`.
    pub fn load_camera_model(&self) -> Result<CameraModel, ConfigError> {
        Ok(CameraModel::read(&self.camera_calibration)?)
    }
}

/// Camera calibration capture settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraCalibrationParams {
    /// Frames with fewer detected ids are not captured.
    pub min_marker_ids: usize,
    /// A solve is attempted on every capture once the count exceeds this.
    pub recompute_after: usize,
    /// Added to every board point, in millimetres.
    pub offset_mm: [f64; 3],
    /// Where [`crate::CameraCalibrationEngine::compute`] writes the model.
    pub write_path: Option<PathBuf>,
}

impl Default for CameraCalibrationParams {
    fn default() -> Self {
        Self {
            min_marker_ids: 4,
            recompute_after: 4,
            offset_mm: [0.0; 3],
            write_path: None,
        }
    }
}

impl CameraCalibrationParams {
    /// Board offset in metres.
    pub fn offset(&self) -> Vector3<f64> {
        Vector3::from(self.offset_mm) * MM_TO_M
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    use crate::BackendRequirement;

    const SESSION: &str = r#"{
        "screen": 2,
        "camera": "P1",
        "camera-calibration": "camera.yaml",
        "write": "out/projector.yaml",
        "surfaces": [
            [[0, 0, 0], [400, 0, 0], [400, 300, 0], [0, 300, 0]],
            [[0, 0, 0], [0, 300, 0], [0, 300, 300]]
        ],
        "omit": [12, 40]
    }"#;

    #[test]
    fn parses_session_with_defaults() {
        let cfg = ProjectorSessionConfig::from_json_str(SESSION).unwrap();
        assert_eq!(cfg.screen, 2);
        assert!(!cfg.invert);
        assert_eq!(cfg.marker_size, DEFAULT_MARKER_SIZE);
        assert_eq!(cfg.omit, vec![12, 40]);
        assert_eq!(
            cfg.camera_selection().unwrap().requirement,
            BackendRequirement::Secondary
        );

        let surfaces = cfg.surfaces().unwrap();
        assert_eq!(surfaces.len(), 2);
        assert_abs_diff_eq!(surfaces[0].points()[1].x, 0.4, epsilon = 1e-12);
    }

    #[test]
    fn load_resolves_paths_next_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, SESSION).unwrap();

        let cfg = ProjectorSessionConfig::load_json(&path).unwrap();
        assert_eq!(cfg.camera_calibration, dir.path().join("camera.yaml"));
        assert_eq!(cfg.write, dir.path().join("out/projector.yaml"));
    }

    #[test]
    fn rejects_invalid_values() {
        let zero_screen = SESSION.replace("\"screen\": 2", "\"screen\": 0");
        let err = ProjectorSessionConfig::from_json_str(&zero_screen).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "screen", .. }));

        let colinear = SESSION.replace("[0, 300, 300]", "[0, 600, 0]");
        let err = ProjectorSessionConfig::from_json_str(&colinear).unwrap_err();
        assert!(matches!(err, ConfigError::Surface { index: 1, .. }));
        assert_eq!(err.kind(), ErrorKind::DegenerateGeometry);

        let bad_camera = SESSION.replace("\"P1\"", "\"X1\"");
        let err = ProjectorSessionConfig::from_json_str(&bad_camera).unwrap_err();
        assert!(matches!(err, ConfigError::Camera(_)));

        let err = ProjectorSessionConfig::from_json_str("{\"screen\": 1}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn missing_camera_calibration_is_io() {
        let mut cfg = ProjectorSessionConfig::from_json_str(SESSION).unwrap();
        cfg.resolve_paths(Path::new("/nonexistent-procam-dir"));
        let err = cfg.load_camera_model().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn camera_params_defaults_and_offset() {
        let p: CameraCalibrationParams = serde_json::from_str("{\"offset_mm\": [10, 0, -5]}").unwrap();
        assert_eq!(p.min_marker_ids, 4);
        assert_eq!(p.recompute_after, 4);
        assert_abs_diff_eq!(p.offset(), Vector3::new(0.01, 0.0, -0.005), epsilon = 1e-12);
        assert_eq!(CameraCalibrationParams::default().offset(), Vector3::zeros());
    }
}
