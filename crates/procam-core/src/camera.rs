//! Pinhole camera model with Brown–Conrady distortion and a history of poses.
//!
//! The same type describes a calibrated camera and a calibrated projector: a
//! projector is an inverse camera whose "image" is the canvas it displays.
//! When a projector was solved against a single planar surface, the model
//! degenerates to a plane-to-canvas homography (no distortion, no poses) and
//! only [`CameraModel::project2d`] / [`CameraModel::unproject2d`] apply.

use nalgebra::{Matrix3, Point2, Point3, Rotation3, Unit, Vector3};
use serde::{Deserialize, Serialize};

use crate::{Distortion, ModelError, Ray};

/// Image size in pixels, stored as `rows × cols` like the calibration file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub rows: u32,
    pub cols: u32,
}

impl ImageSize {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.cols
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.rows
    }
}

/// Extrinsic pose: world → camera, `c = R(rvec) * w + tvec`.
///
/// `rvec` is a Rodrigues (axis × angle) rotation vector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub rvec: Vector3<f64>,
    pub tvec: Vector3<f64>,
}

impl Pose {
    pub fn new(rvec: Vector3<f64>, tvec: Vector3<f64>) -> Self {
        Self { rvec, tvec }
    }

    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), Vector3::zeros())
    }

    /// Build from a rotation matrix; the matrix is assumed orthonormal.
    pub fn from_rotation_matrix(r: &Matrix3<f64>, tvec: Vector3<f64>) -> Self {
        let rot = Rotation3::from_matrix_unchecked(*r);
        Self::new(rot.scaled_axis(), tvec)
    }

    #[inline]
    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::new(self.rvec)
    }

    /// World point expressed in the camera frame.
    #[inline]
    pub fn transform(&self, w: &Point3<f64>) -> Point3<f64> {
        self.rotation() * w + self.tvec
    }

    /// Camera-frame point expressed in the world frame.
    #[inline]
    pub fn inverse_transform(&self, c: &Point3<f64>) -> Point3<f64> {
        self.rotation().inverse() * (c - self.tvec)
    }

    /// Camera centre in world coordinates.
    pub fn camera_center(&self) -> Point3<f64> {
        self.inverse_transform(&Point3::origin())
    }
}

/// Calibrated camera or projector.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraModel {
    image_size: Option<ImageSize>,
    matrix: Matrix3<f64>,
    distortion: Option<Distortion>,
    poses: Vec<Pose>,
    valid: bool,
}

impl Default for CameraModel {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraModel {
    /// Uncalibrated model: identity matrix, no distortion, no poses.
    pub fn new() -> Self {
        Self {
            image_size: None,
            matrix: Matrix3::identity(),
            distortion: None,
            poses: Vec::new(),
            valid: false,
        }
    }

    /// Fully specified model; marks it valid.
    pub fn from_parts(
        image_size: Option<ImageSize>,
        matrix: Matrix3<f64>,
        distortion: Option<Distortion>,
        poses: Vec<Pose>,
    ) -> Self {
        Self {
            image_size,
            matrix,
            distortion,
            poses,
            valid: true,
        }
    }

    /// Planar homography model (`project2d`/`unproject2d` only).
    pub fn homography(image_size: Option<ImageSize>, h: Matrix3<f64>) -> Self {
        Self::from_parts(image_size, h, None, Vec::new())
    }

    /// Replace all calibration fields and mark the model valid.
    pub fn set(
        &mut self,
        image_size: Option<ImageSize>,
        matrix: Matrix3<f64>,
        distortion: Option<Distortion>,
        poses: Vec<Pose>,
    ) {
        *self = Self::from_parts(image_size, matrix, distortion, poses);
    }

    /// Replace the model by a homography and mark it valid.
    pub fn set_homography(&mut self, h: Matrix3<f64>) {
        let image_size = self.image_size;
        *self = Self::homography(image_size, h);
    }

    /// Set the working image size without touching validity.
    pub fn set_image_size(&mut self, size: ImageSize) {
        self.image_size = Some(size);
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// True for a valid model that only carries a plane homography.
    pub fn is_homography(&self) -> bool {
        self.valid && self.distortion.is_none() && self.poses.is_empty()
    }

    #[inline]
    pub fn image_size(&self) -> Option<ImageSize> {
        self.image_size
    }

    #[inline]
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    #[inline]
    pub fn distortion(&self) -> Option<&Distortion> {
        self.distortion.as_ref()
    }

    #[inline]
    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    /// Most recently solved pose.
    pub fn current_pose(&self) -> Result<&Pose, ModelError> {
        if !self.valid {
            return Err(ModelError::NotCalibrated);
        }
        self.poses.last().ok_or(ModelError::NoPose)
    }

    fn ensure_valid(&self) -> Result<(), ModelError> {
        if self.valid {
            Ok(())
        } else {
            Err(ModelError::NotCalibrated)
        }
    }

    /// Project a world point to pixel coordinates using the current pose.
    pub fn project(&self, w: &Point3<f64>) -> Result<Point2<f64>, ModelError> {
        let pose = self.current_pose()?;
        let c = pose.transform(w);
        if c.z == 0.0 {
            return Err(ModelError::OnCameraPlane { z: c.z });
        }

        let normalized = Point2::new(c.x / c.z, c.y / c.z);
        let distorted = match &self.distortion {
            Some(d) => d.distort(normalized),
            None => normalized,
        };

        let uv = self.matrix * Vector3::new(distorted.x, distorted.y, 1.0);
        Ok(Point2::new(uv.x, uv.y))
    }

    /// Map a plane point through the matrix treated as a homography.
    pub fn project2d(&self, p: &Point2<f64>) -> Result<Point2<f64>, ModelError> {
        self.ensure_valid()?;
        apply_homogeneous(&self.matrix, p)
    }

    /// Inverse of [`CameraModel::project2d`].
    pub fn unproject2d(&self, uv: &Point2<f64>) -> Result<Point2<f64>, ModelError> {
        self.ensure_valid()?;
        let inv = self
            .matrix
            .try_inverse()
            .ok_or(ModelError::SingularMatrix)?;
        apply_homogeneous(&inv, uv)
    }

    /// Remove the intrinsics and lens distortion from a pixel, producing the
    /// normalized camera-space point `(x', y')` on the `z = 1` plane.
    pub fn undistort_point(&self, uv: &Point2<f64>) -> Result<Point2<f64>, ModelError> {
        self.ensure_valid()?;
        let k_inv = self
            .matrix
            .try_inverse()
            .ok_or(ModelError::SingularMatrix)?;
        let distorted = apply_homogeneous(&k_inv, uv)?;
        match &self.distortion {
            Some(d) => d.undistort(distorted),
            None => Ok(distorted),
        }
    }

    /// World-space ray of all points that project onto pixel `uv`.
    pub fn unproject(&self, uv: &Point2<f64>) -> Result<Ray, ModelError> {
        let pose = self.current_pose()?;
        let xy = self.undistort_point(uv)?;

        let p = Point3::new(xy.x, xy.y, 1.0);
        let w = pose.inverse_transform(&p);
        let o = pose.camera_center();

        let direction = Unit::try_new(w - o, f64::EPSILON).ok_or(ModelError::SingularMatrix)?;
        Ok(Ray::new(o, direction))
    }

    /// Intersection of `ray` with the plane `Z = z`.
    pub fn ray_intersect_plane_z(&self, ray: &Ray, z: f64) -> Result<Point3<f64>, ModelError> {
        ray.intersect_plane_z(z)
    }
}

fn apply_homogeneous(m: &Matrix3<f64>, p: &Point2<f64>) -> Result<Point2<f64>, ModelError> {
    let v = m * Vector3::new(p.x, p.y, 1.0);
    if v.z == 0.0 {
        return Err(ModelError::OnCameraPlane { z: v.z });
    }
    Ok(Point2::new(v.x / v.z, v.y / v.z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    fn k() -> Matrix3<f64> {
        Matrix3::new(800.0, 0.0, 320.0, 0.0, 800.0, 240.0, 0.0, 0.0, 1.0)
    }

    fn model(distortion: Option<Distortion>, pose: Pose) -> CameraModel {
        CameraModel::from_parts(Some(ImageSize::new(480, 640)), k(), distortion, vec![pose])
    }

    #[test]
    fn uncalibrated_model_rejects_projection() {
        let m = CameraModel::new();
        assert_eq!(
            m.project(&Point3::new(0.0, 0.0, 1.0)),
            Err(ModelError::NotCalibrated)
        );
        assert_eq!(m.unproject(&Point2::new(1.0, 1.0)).unwrap_err(), ModelError::NotCalibrated);
    }

    #[test]
    fn homography_model_has_no_pose() {
        let m = CameraModel::homography(None, Matrix3::identity());
        assert!(m.is_homography());
        assert_eq!(m.project(&Point3::new(0.0, 0.0, 1.0)), Err(ModelError::NoPose));
    }

    #[test]
    fn project_with_hand_computed_distortion() {
        let d = Distortion {
            k1: 0.1,
            k2: 0.0,
            p1: 0.01,
            p2: 0.02,
            k3: 0.0,
        };
        let pose = Pose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 1.0));
        let uv = model(Some(d), pose)
            .project(&Point3::new(0.1, 0.2, 0.0))
            .unwrap();
        // x'' = 0.1023, y'' = 0.2031
        assert_abs_diff_eq!(uv.x, 401.84, epsilon = 1e-9);
        assert_abs_diff_eq!(uv.y, 402.48, epsilon = 1e-9);
    }

    #[test]
    fn rodrigues_vector_rotates_about_axis() {
        // Quarter turn about +z maps (x, y) to (-y, x).
        let pose = Pose::new(Vector3::new(0.0, 0.0, FRAC_PI_2), Vector3::new(0.0, 0.0, 1.0));
        let uv = model(None, pose)
            .project(&Point3::new(0.1, 0.2, 0.0))
            .unwrap();
        assert_abs_diff_eq!(uv.x, 160.0, epsilon = 1e-9);
        assert_abs_diff_eq!(uv.y, 320.0, epsilon = 1e-9);
    }

    #[test]
    fn current_pose_is_last() {
        let first = Pose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 1.0));
        let last = Pose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 2.0));
        let m = CameraModel::from_parts(None, k(), None, vec![first, last]);
        assert_eq!(m.current_pose().unwrap(), &last);
        let uv = m.project(&Point3::new(0.2, 0.0, 0.0)).unwrap();
        assert_abs_diff_eq!(uv.x, 400.0, epsilon = 1e-9);
    }

    #[test]
    fn unproject_then_intersect_recovers_point() {
        let d = Distortion {
            k1: -0.21,
            k2: 0.05,
            p1: 0.001,
            p2: -0.0015,
            k3: 0.002,
        };
        let pose = Pose::new(Vector3::new(0.3, -0.2, 0.1), Vector3::new(-0.05, 0.02, 0.6));
        let m = model(Some(d), pose);

        for w in [
            Point3::new(0.01890533, 0.12916625, 0.00284014),
            Point3::new(-0.05214326, -0.03002264, -0.00936422),
            Point3::new(0.1, -0.08, 0.02),
        ] {
            let uv = m.project(&w).unwrap();
            let ray = m.unproject(&uv).unwrap();
            let back = m.ray_intersect_plane_z(&ray, w.z).unwrap();
            assert_abs_diff_eq!(back.x, w.x, epsilon = 1e-5);
            assert_abs_diff_eq!(back.y, w.y, epsilon = 1e-5);
            assert_abs_diff_eq!(back.z, w.z, epsilon = 1e-5);
        }
    }

    #[test]
    fn ray_origin_is_camera_center() {
        let pose = Pose::new(Vector3::new(0.0, 0.4, 0.0), Vector3::new(0.1, 0.0, 1.5));
        let m = model(None, pose);
        let ray = m.unproject(&Point2::new(100.0, 50.0)).unwrap();
        let c = pose.transform(&ray.origin);
        assert_abs_diff_eq!(c.coords.norm(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ray.direction.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn homography_round_trip() {
        let h = Matrix3::new(1.2, 0.1, 640.0, -0.05, 0.9, 360.0, 0.0004, 0.0002, 1.0);
        let m = CameraModel::homography(None, h);
        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(112.0, 78.0),
            Point2::new(-182.7, -53.1),
        ] {
            let uv = m.project2d(&p).unwrap();
            let back = m.unproject2d(&uv).unwrap();
            assert_abs_diff_eq!(back.x, p.x, epsilon = 1e-5);
            assert_abs_diff_eq!(back.y, p.y, epsilon = 1e-5);
        }
    }

    #[test]
    fn pose_from_rotation_matrix_round_trips() {
        let rvec = Vector3::new(0.2, -0.4, 0.7);
        let r = Rotation3::new(rvec);
        let pose = Pose::from_rotation_matrix(r.matrix(), Vector3::new(1.0, 2.0, 3.0));
        assert_abs_diff_eq!((pose.rvec - rvec).norm(), 0.0, epsilon = 1e-12);
    }
}
