//! Planar reference surfaces with known world coordinates.

use nalgebra::{Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::{contains_all_corners, CameraModel, ErrorKind, ModelError, Ray};

const MM_TO_M: f64 = 0.001;
const COLINEAR_EPS: f64 = 1e-12;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SurfaceError {
    #[error("a surface needs at least 3 reference points, got {count}")]
    TooFewPoints { count: usize },
    #[error("the first three reference points are colinear")]
    Colinear,
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl SurfaceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SurfaceError::TooFewPoints { .. } => ErrorKind::InsufficientData,
            SurfaceError::Colinear => ErrorKind::DegenerateGeometry,
            SurfaceError::Model(e) => e.kind(),
        }
    }
}

/// Ordered coplanar reference points, in metres.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSurface")]
pub struct Surface {
    points: Vec<Point3<f64>>,
}

#[derive(Deserialize)]
struct RawSurface {
    points: Vec<Point3<f64>>,
}

impl TryFrom<RawSurface> for Surface {
    type Error = SurfaceError;

    fn try_from(raw: RawSurface) -> Result<Self, Self::Error> {
        Surface::new(raw.points)
    }
}

impl Surface {
    /// Build from points in metres.
    pub fn new(points: Vec<Point3<f64>>) -> Result<Self, SurfaceError> {
        if points.len() < 3 {
            return Err(SurfaceError::TooFewPoints {
                count: points.len(),
            });
        }
        Ok(Self { points })
    }

    /// Build from `[x, y, z]` points given in millimetres.
    pub fn from_millimeters(points_mm: &[[f64; 3]]) -> Result<Self, SurfaceError> {
        Self::new(
            points_mm
                .iter()
                .map(|p| Point3::new(p[0] * MM_TO_M, p[1] * MM_TO_M, p[2] * MM_TO_M))
                .collect(),
        )
    }

    #[inline]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Point on the plane used for intersections (the first reference point).
    #[inline]
    pub fn origin(&self) -> Point3<f64> {
        self.points[0]
    }

    /// Unit normal `(p1 - p0) × (p2 - p0)`.
    pub fn normal(&self) -> Result<Vector3<f64>, SurfaceError> {
        let p = &self.points;
        let n = (p[1] - p[0]).cross(&(p[2] - p[0]));
        let len = n.norm();
        if len < COLINEAR_EPS {
            return Err(SurfaceError::Colinear);
        }
        Ok(n / len)
    }

    /// Outline of the surface in the model's image, rounded to whole pixels.
    pub fn project_corners(&self, model: &CameraModel) -> Result<Vec<Point2<f64>>, SurfaceError> {
        self.points
            .iter()
            .map(|p| {
                let uv = model.project(p)?;
                Ok(Point2::new(uv.x.round(), uv.y.round()))
            })
            .collect()
    }

    /// Intersection of `ray` with this surface's plane.
    pub fn intersect(&self, ray: &Ray) -> Result<Point3<f64>, SurfaceError> {
        let n = self.normal()?;
        Ok(ray.intersect_plane(&self.origin(), &n)?)
    }
}

/// Index of the first outline that contains every corner.
pub fn assign_to_first_containing(
    outlines: &[Vec<Point2<f64>>],
    corners: &[Point2<f64>],
) -> Option<usize> {
    outlines
        .iter()
        .position(|outline| contains_all_corners(outline, corners))
}
