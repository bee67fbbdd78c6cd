//! YAML calibration file for [`CameraModel`].
//!
//! Layout (all keys at the top level):
//!
//! ```yaml
//! imsize: [480, 640]          # rows, cols
//! camera_matrix: [[fx, 0, cx], [0, fy, cy], [0, 0, 1]]
//! dist_coeff: [[k1, k2, p1, p2, k3]]   # or null for a homography model
//! rvecs: [[[rx], [ry], [rz]], ...]     # or null
//! tvecs: [[[tx], [ty], [tz]], ...]     # or null
//! ```
//!
//! Column vectors (`[[x], [y], [z]]`) are written; flat `[x, y, z]` vectors and
//! a flat distortion list are accepted on read.

use std::{fs, path::Path};

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::{CameraModel, Distortion, ErrorKind, ImageSize, Pose};

#[derive(thiserror::Error, Debug)]
pub enum CalibrationIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error("rvecs and tvecs differ in length ({rvecs} vs {tvecs})")]
    PoseCountMismatch { rvecs: usize, tvecs: usize },
}

impl CalibrationIoError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Io
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum VectorRepr {
    Column([[f64; 1]; 3]),
    Flat([f64; 3]),
}

impl VectorRepr {
    fn to_vector(self) -> Vector3<f64> {
        match self {
            VectorRepr::Column(c) => Vector3::new(c[0][0], c[1][0], c[2][0]),
            VectorRepr::Flat(v) => Vector3::new(v[0], v[1], v[2]),
        }
    }

    fn column(v: &Vector3<f64>) -> Self {
        VectorRepr::Column([[v.x], [v.y], [v.z]])
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum DistortionRepr {
    Nested(Vec<Vec<f64>>),
    Flat(Vec<f64>),
}

impl DistortionRepr {
    fn to_distortion(&self) -> Distortion {
        match self {
            DistortionRepr::Nested(rows) => {
                let flat: Vec<f64> = rows.iter().flatten().copied().collect();
                Distortion::from_slice(&flat)
            }
            DistortionRepr::Flat(v) => Distortion::from_slice(v),
        }
    }
}

/// On-disk representation of a calibrated model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalibrationFile {
    #[serde(default)]
    imsize: Option<Vec<u32>>,
    camera_matrix: [[f64; 3]; 3],
    #[serde(default)]
    dist_coeff: Option<DistortionRepr>,
    #[serde(default)]
    rvecs: Option<Vec<VectorRepr>>,
    #[serde(default)]
    tvecs: Option<Vec<VectorRepr>>,
}

impl CalibrationFile {
    pub fn from_model(model: &CameraModel) -> Self {
        let m = model.matrix();
        let camera_matrix = [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ];

        let (rvecs, tvecs) = if model.poses().is_empty() {
            (None, None)
        } else {
            let r = model.poses().iter().map(|p| VectorRepr::column(&p.rvec));
            let t = model.poses().iter().map(|p| VectorRepr::column(&p.tvec));
            (Some(r.collect()), Some(t.collect()))
        };

        Self {
            imsize: model.image_size().map(|s| vec![s.rows, s.cols]),
            camera_matrix,
            dist_coeff: model
                .distortion()
                .map(|d| DistortionRepr::Nested(vec![d.to_array().to_vec()])),
            rvecs,
            tvecs,
        }
    }

    pub fn into_model(self) -> Result<CameraModel, CalibrationIoError> {
        let rows = self.camera_matrix;
        let matrix = Matrix3::new(
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        );

        let rvecs = self.rvecs.unwrap_or_default();
        let tvecs = self.tvecs.unwrap_or_default();
        if rvecs.len() != tvecs.len() {
            return Err(CalibrationIoError::PoseCountMismatch {
                rvecs: rvecs.len(),
                tvecs: tvecs.len(),
            });
        }
        let poses = rvecs
            .into_iter()
            .zip(tvecs)
            .map(|(r, t)| Pose::new(r.to_vector(), t.to_vector()))
            .collect();

        let image_size = match self.imsize.as_deref() {
            Some([rows, cols, ..]) => Some(ImageSize::new(*rows, *cols)),
            _ => None,
        };

        Ok(CameraModel::from_parts(
            image_size,
            matrix,
            self.dist_coeff.as_ref().map(DistortionRepr::to_distortion),
            poses,
        ))
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, CalibrationIoError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn to_yaml_string(&self) -> Result<String, CalibrationIoError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

impl CameraModel {
    /// Load a calibration file. The model is valid once the fields parse.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, CalibrationIoError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let model = CalibrationFile::from_yaml_str(&raw)?.into_model()?;
        log::debug!(
            "loaded calibration from {} ({} poses)",
            path.display(),
            model.poses().len()
        );
        Ok(model)
    }

    /// Write this model as a YAML calibration file.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), CalibrationIoError> {
        let yaml = CalibrationFile::from_model(self).to_yaml_string()?;
        fs::write(path, yaml)?;
        Ok(())
    }
}
