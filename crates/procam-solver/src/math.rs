//! Small linear-algebra helpers shared by the solvers.

use nalgebra::{DMatrix, Matrix3, Matrix3x4, Matrix4, Point3, SymmetricEigen, Vector3};

/// Hartley normalization in 3D: centroid to the origin, mean distance `sqrt(3)`.
pub fn normalize_points_3d(points: &[Point3<f64>]) -> Option<(Vec<Point3<f64>>, Matrix4<f64>)> {
    if points.is_empty() {
        return None;
    }

    let n = points.len() as f64;
    let c = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n;
    let mean_dist = points.iter().map(|p| (p.coords - c).norm()).sum::<f64>() / n;
    if mean_dist <= f64::EPSILON {
        return None;
    }

    let s = (3.0_f64).sqrt() / mean_dist;
    let t = Matrix4::new(
        s,
        0.0,
        0.0,
        -s * c.x,
        0.0,
        s,
        0.0,
        -s * c.y,
        0.0,
        0.0,
        s,
        -s * c.z,
        0.0,
        0.0,
        0.0,
        1.0,
    );
    let out = points
        .iter()
        .map(|p| Point3::from((p.coords - c) * s))
        .collect();
    Some((out, t))
}

/// Row `row_idx` of `v_t` reshaped row-major into a 3x4 matrix.
pub fn mat34_from_svd_row(v_t: &DMatrix<f64>, row_idx: usize) -> Matrix3x4<f64> {
    let mut m = Matrix3x4::<f64>::zeros();
    for r in 0..3 {
        for c in 0..4 {
            m[(r, c)] = v_t[(row_idx, 4 * r + c)];
        }
    }
    m
}

/// Index of the smallest singular value.
pub fn argmin(values: impl IntoIterator<Item = f64>) -> Option<usize> {
    values
        .into_iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

/// Closest rotation (det = +1) to `m` in the Frobenius sense.
pub fn orthonormalize(m: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let svd = m.svd(true, true);
    let mut u = svd.u?;
    let v_t = svd.v_t?;
    if (u * v_t).determinant() < 0.0 {
        u.column_mut(2).neg_mut();
    }
    Some(u * v_t)
}

/// Best-fit plane of a point set.
#[derive(Clone, Copy, Debug)]
pub struct PlaneFit {
    pub centroid: Point3<f64>,
    /// Columns `[e1, e2, n]`; a proper rotation.
    pub basis: Matrix3<f64>,
    /// Smallest over largest scatter eigenvalue.
    pub flatness: f64,
}

impl PlaneFit {
    /// Below this flatness a point set is treated as coplanar.
    pub const PLANAR_EPS: f64 = 1e-10;

    pub fn fit(points: &[Point3<f64>]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }
        let n = points.len() as f64;
        let c = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n;
        let scatter = points.iter().fold(Matrix3::zeros(), |acc, p| {
            let d = p.coords - c;
            acc + d * d.transpose()
        });

        let eig = SymmetricEigen::new(scatter);
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));
        let largest = eig.eigenvalues[order[0]];
        if largest <= f64::EPSILON {
            return None;
        }

        let e1 = eig.eigenvectors.column(order[0]).into_owned();
        let e2 = eig.eigenvectors.column(order[1]).into_owned();
        let normal = e1.cross(&e2).normalize();
        let e2 = normal.cross(&e1);

        Some(Self {
            centroid: Point3::from(c),
            basis: Matrix3::from_columns(&[e1, e2, normal]),
            flatness: eig.eigenvalues[order[2]].max(0.0) / largest,
        })
    }

    #[inline]
    pub fn is_planar(&self) -> bool {
        self.flatness < Self::PLANAR_EPS
    }

    /// In-plane coordinates `(e1 · (p - c), e2 · (p - c))`.
    pub fn to_plane(&self, p: &Point3<f64>) -> nalgebra::Point2<f64> {
        let d = self.basis.transpose() * (p - self.centroid);
        nalgebra::Point2::new(d.x, d.y)
    }
}
