use nalgebra::{Point3, Unit, Vector3};
use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Below this `|d · n|` a ray is treated as parallel to a plane.
pub const PARALLEL_EPS: f64 = 1e-12;

/// A half-line `origin + t * direction` in world coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    pub origin: Point3<f64>,
    pub direction: Unit<Vector3<f64>>,
}

impl Ray {
    pub fn new(origin: Point3<f64>, direction: Unit<Vector3<f64>>) -> Self {
        Self { origin, direction }
    }

    #[inline]
    pub fn at(&self, t: f64) -> Point3<f64> {
        self.origin + self.direction.into_inner() * t
    }

    /// Intersection with the plane `Z = z`.
    pub fn intersect_plane_z(&self, z: f64) -> Result<Point3<f64>, ModelError> {
        let dz = self.direction.z;
        if dz.abs() < PARALLEL_EPS {
            return Err(ModelError::ParallelRay);
        }
        Ok(self.at((z - self.origin.z) / dz))
    }

    /// Intersection with the plane through `point` with normal `normal`.
    ///
    /// `t = dot(point - origin, n) / dot(direction, n)`.
    pub fn intersect_plane(
        &self,
        point: &Point3<f64>,
        normal: &Vector3<f64>,
    ) -> Result<Point3<f64>, ModelError> {
        let dn = self.direction.dot(normal);
        if dn.abs() < PARALLEL_EPS {
            return Err(ModelError::ParallelRay);
        }
        let t = (point - self.origin).dot(normal) / dn;
        Ok(self.at(t))
    }
}
