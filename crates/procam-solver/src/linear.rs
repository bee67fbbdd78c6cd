use nalgebra::{Matrix3, Matrix3x4, Point2, Point3, Vector3};
use procam_core::{estimate_homography, CorrespondenceSet, Distortion, ImageSize, Pose};

use crate::distortion_fit::{fit_distortion, DistortionSample};
use crate::dlt::{decompose_camera_matrix, dlt_camera_matrix, MIN_DLT_POINTS};
use crate::math::PlaneFit;
use crate::pose::{pose_from_homography, pose_from_projection};
use crate::zhang::{intrinsics_from_homographies, intrinsics_with_principal_point, MIN_ZHANG_VIEWS};
use crate::{CalibrationFlags, CameraSolution, CameraSolver, SolverError};

const MIN_PLANAR_POINTS: usize = 4;
const CONVERGED_EPS: f64 = 1e-12;

/// Closed-form camera calibration.
///
/// Each view is either coplanar (solved through a plane homography in the
/// view's own plane frame) or general (solved with the 3x4 DLT). Intrinsics
/// come from, in order: the largest general view, Zhang's method over the
/// plane views, the initial guess (`use_intrinsic_guess`), or focal lengths
/// with the principal point at the image centre. Distortion is fitted
/// linearly, and the observations are undistorted and the views re-solved
/// until the coefficients stop changing.
#[derive(Clone, Copy, Debug)]
pub struct LinearCameraSolver {
    pub max_iterations: usize,
}

impl Default for LinearCameraSolver {
    fn default() -> Self {
        Self { max_iterations: 10 }
    }
}

#[derive(Clone, Copy, Debug)]
enum ViewKind {
    Planar(PlaneFit),
    General,
}

/// Per-view linear model fitted to (undistorted) observations.
enum ViewModel {
    Planar { plane: PlaneFit, h: Matrix3<f64> },
    General { p: Matrix3x4<f64> },
}

fn classify(view: &CorrespondenceSet) -> Result<ViewKind, SolverError> {
    let world = view.world_points();
    let fit = PlaneFit::fit(world).ok_or(SolverError::Degenerate("world points coincide"))?;
    if fit.is_planar() {
        if world.len() < MIN_PLANAR_POINTS {
            return Err(SolverError::NotEnoughPoints {
                needed: MIN_PLANAR_POINTS,
                got: world.len(),
            });
        }
        Ok(ViewKind::Planar(fit))
    } else {
        if world.len() < MIN_DLT_POINTS {
            return Err(SolverError::NotEnoughPoints {
                needed: MIN_DLT_POINTS,
                got: world.len(),
            });
        }
        Ok(ViewKind::General)
    }
}

fn fit_view(
    kind: &ViewKind,
    world: &[Point3<f64>],
    image: &[Point2<f64>],
) -> Result<ViewModel, SolverError> {
    match kind {
        ViewKind::Planar(plane) => {
            let plane_pts: Vec<Point2<f64>> = world.iter().map(|p| plane.to_plane(p)).collect();
            let h = estimate_homography(&plane_pts, image)
                .ok_or(SolverError::Degenerate("plane view homography is singular"))?;
            Ok(ViewModel::Planar {
                plane: *plane,
                h: h.h,
            })
        }
        ViewKind::General => Ok(ViewModel::General {
            p: dlt_camera_matrix(world, image)?,
        }),
    }
}

fn undistort_pixel(
    k: &Matrix3<f64>,
    k_inv: &Matrix3<f64>,
    d: &Distortion,
    uv: &Point2<f64>,
) -> Result<Point2<f64>, SolverError> {
    let n = k_inv * Vector3::new(uv.x, uv.y, 1.0);
    let u = d.undistort(Point2::new(n.x / n.z, n.y / n.z))?;
    let px = k * Vector3::new(u.x, u.y, 1.0);
    Ok(Point2::new(px.x / px.z, px.y / px.z))
}

fn project(k: &Matrix3<f64>, d: &Distortion, pose: &Pose, w: &Point3<f64>) -> Point2<f64> {
    let c = pose.transform(w);
    let n = d.distort(Point2::new(c.x / c.z, c.y / c.z));
    let px = k * Vector3::new(n.x, n.y, 1.0);
    Point2::new(px.x, px.y)
}

impl LinearCameraSolver {
    fn intrinsics(
        &self,
        models: &[ViewModel],
        image_size: ImageSize,
        initial_matrix: Option<&Matrix3<f64>>,
        flags: &CalibrationFlags,
        point_counts: &[usize],
    ) -> Result<Matrix3<f64>, SolverError> {
        let largest_general = models
            .iter()
            .zip(point_counts)
            .filter_map(|(m, n)| match m {
                ViewModel::General { p } => Some((p, *n)),
                ViewModel::Planar { .. } => None,
            })
            .max_by_key(|(_, n)| *n);
        let guess = initial_matrix.filter(|_| flags.use_intrinsic_guess);
        if let Some((p, _)) = largest_general {
            if guess.is_some() {
                log::debug!("non-coplanar view present: camera matrix from DLT, initial guess ignored");
            }
            return Ok(decompose_camera_matrix(p)?.k);
        }

        let hs: Vec<Matrix3<f64>> = models
            .iter()
            .filter_map(|m| match m {
                ViewModel::Planar { h, .. } => Some(*h),
                ViewModel::General { .. } => None,
            })
            .collect();
        if hs.len() >= MIN_ZHANG_VIEWS {
            if guess.is_some() {
                log::debug!(
                    "{} planar views: camera matrix from homographies, initial guess ignored",
                    hs.len()
                );
            }
            return intrinsics_from_homographies(&hs);
        }

        if let Some(k) = guess {
            return Ok(*k);
        }

        let cx = f64::from(image_size.cols) * 0.5;
        let cy = f64::from(image_size.rows) * 0.5;
        intrinsics_with_principal_point(&hs, cx, cy)
            .map_err(|_| SolverError::NoIntrinsics("views do not determine the camera matrix"))
    }

    fn poses(&self, k: &Matrix3<f64>, models: &[ViewModel]) -> Result<Vec<Pose>, SolverError> {
        models
            .iter()
            .map(|m| match m {
                ViewModel::General { p } => {
                    let (r, t) = pose_from_projection(k, p)?;
                    Ok(Pose::from_rotation_matrix(&r, t))
                }
                ViewModel::Planar { plane, h } => {
                    // Plane frame: w = c0 + B q; camera: R_p q + t_p.
                    let (r_p, t_p) = pose_from_homography(k, h)?;
                    let r = r_p * plane.basis.transpose();
                    let t = t_p - r * plane.centroid.coords;
                    Ok(Pose::from_rotation_matrix(&r, t))
                }
            })
            .collect()
    }
}

impl CameraSolver for LinearCameraSolver {
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "info", skip_all, fields(views = views.len()))
    )]
    fn calibrate(
        &self,
        views: &[CorrespondenceSet],
        image_size: ImageSize,
        initial_matrix: Option<&Matrix3<f64>>,
        flags: CalibrationFlags,
    ) -> Result<CameraSolution, SolverError> {
        if views.is_empty() {
            return Err(SolverError::NoViews);
        }
        let kinds = views.iter().map(classify).collect::<Result<Vec<_>, _>>()?;
        let point_counts: Vec<usize> = views.iter().map(CorrespondenceSet::len).collect();

        let mut distortion = Distortion::ZERO;
        let mut k = Matrix3::identity();
        let mut poses = Vec::new();

        for iteration in 0..self.max_iterations.max(1) {
            let models = if iteration == 0 {
                views
                    .iter()
                    .zip(&kinds)
                    .map(|(v, kind)| fit_view(kind, v.world_points(), v.image_points()))
                    .collect::<Result<Vec<_>, _>>()?
            } else {
                let k_inv = k
                    .try_inverse()
                    .ok_or(SolverError::Degenerate("intrinsics matrix is not invertible"))?;
                let mut models = Vec::with_capacity(views.len());
                for (v, kind) in views.iter().zip(&kinds) {
                    let undistorted = v
                        .image_points()
                        .iter()
                        .map(|uv| undistort_pixel(&k, &k_inv, &distortion, uv))
                        .collect::<Result<Vec<_>, _>>()?;
                    models.push(fit_view(kind, v.world_points(), &undistorted)?);
                }
                models
            };

            k = self.intrinsics(&models, image_size, initial_matrix, &flags, &point_counts)?;
            poses = self.poses(&k, &models)?;

            let samples: Vec<DistortionSample> = views
                .iter()
                .zip(&poses)
                .flat_map(|(v, pose)| {
                    v.iter().map(move |(w, uv)| {
                        let c = pose.transform(w);
                        DistortionSample {
                            ideal: Point2::new(c.x / c.z, c.y / c.z),
                            observed: *uv,
                        }
                    })
                })
                .collect();
            let next = fit_distortion(&k, &samples, &flags)?;

            let change = next
                .to_array()
                .iter()
                .zip(distortion.to_array().iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            distortion = next;
            log::debug!("linear calibration iteration {iteration}: distortion change {change:.3e}");
            if change < CONVERGED_EPS {
                break;
            }
        }

        let (sum_sq, count) = views
            .iter()
            .zip(&poses)
            .flat_map(|(v, pose)| v.iter().map(move |(w, uv)| (pose, w, uv)))
            .fold((0.0, 0usize), |(acc, n), (pose, w, uv)| {
                let e = project(&k, &distortion, pose, w) - *uv;
                (acc + e.norm_squared(), n + 1)
            });
        let rms = (sum_sq / count.max(1) as f64).sqrt();
        if !rms.is_finite() {
            return Err(SolverError::Degenerate("solution does not reproject"));
        }

        log::info!(
            "calibrated {} views ({} points): fx={:.2} fy={:.2} cx={:.2} cy={:.2}, rms={:.4}px",
            views.len(),
            count,
            k[(0, 0)],
            k[(1, 1)],
            k[(0, 2)],
            k[(1, 2)],
            rms
        );

        Ok(CameraSolution {
            matrix: k,
            distortion,
            poses,
            rms,
        })
    }
}
