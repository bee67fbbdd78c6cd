use nalgebra::{DMatrix, Matrix3, Point2, Vector2, Vector3};

/// Plane-to-plane projective map, `dst ~ H * src`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    /// Build from row-major nested arrays.
    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_fn(|r, c| rows[r][c]))
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v[0] / v[2], v[1] / v[2])
    }

    /// `None` when `h` is singular.
    pub fn inverse(&self) -> Option<Self> {
        Some(Self::new(self.h.try_inverse()?))
    }
}

/// Translate to the centroid and scale so the mean distance is `sqrt(2)`.
pub fn normalize_points(pts: &[Point2<f64>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    let n = pts.len().max(1) as f64;
    let centroid = pts.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords) / n;
    let spread = pts.iter().map(|p| (p.coords - centroid).norm()).sum::<f64>() / n;
    let scale = if spread > 1e-12 {
        std::f64::consts::SQRT_2 / spread
    } else {
        1.0
    };

    let t = Matrix3::new(
        scale,
        0.0,
        -scale * centroid.x,
        0.0,
        scale,
        -scale * centroid.y,
        0.0,
        0.0,
        1.0,
    );
    let out = pts
        .iter()
        .map(|p| Point2::from((p.coords - centroid) * scale))
        .collect();
    (out, t)
}

/// Estimate H such that `dst ~ H * src` with the normalized DLT.
///
/// Needs at least 4 correspondences; returns `None` when the system is
/// degenerate (e.g. three or more colinear source points out of four).
pub fn estimate_homography(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }

    let (src_n, t_src) = normalize_points(src);
    let (dst_n, t_dst) = normalize_points(dst);

    // Two rows per pair, padded to 9 so the SVD yields a full V^T for 4 pairs.
    let mut a = DMatrix::<f64>::zeros((2 * src.len()).max(9), 9);
    for (k, (s, d)) in src_n.iter().zip(&dst_n).enumerate() {
        let (x, y) = (s.x, s.y);
        let rows = [
            [-x, -y, -1.0, 0.0, 0.0, 0.0, d.x * x, d.x * y, d.x],
            [0.0, 0.0, 0.0, -x, -y, -1.0, d.y * x, d.y * y, d.y],
        ];
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                a[(2 * k + r, c)] = *value;
            }
        }
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let mut sv: Vec<(usize, f64)> = svd.singular_values.iter().copied().enumerate().collect();
    sv.sort_by(|a, b| a.1.total_cmp(&b.1));

    // A second (near) null vector means the points do not pin H down.
    let largest = sv.last()?.1.max(1e-300);
    if sv.len() >= 2 && sv[1].1 <= 1e-10 * largest {
        return None;
    }

    let null = v_t.row(sv[0].0);
    let h_norm = Matrix3::from_fn(|r, c| null[3 * r + c]);

    let h = t_dst.try_inverse()? * h_norm * t_src;
    let w = h[(2, 2)];
    if w.abs() < 1e-12 || h.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(Homography::new(h / w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample_h() -> Homography {
        Homography::from_array([
            [1.8, 0.12, 412.0],
            [-0.07, 1.65, 233.0],
            [0.00031, -0.00012, 1.0],
        ])
    }

    #[test]
    fn recovers_exact_homography() {
        let h = sample_h();
        let src: Vec<Point2<f64>> = (0..5)
            .flat_map(|i| (0..4).map(move |j| Point2::new(i as f64 * 0.05, j as f64 * 0.04)))
            .collect();
        let dst: Vec<_> = src.iter().map(|p| h.apply(*p)).collect();

        let est = estimate_homography(&src, &dst).unwrap();
        for (s, d) in src.iter().zip(&dst) {
            let p = est.apply(*s);
            assert_abs_diff_eq!(p.x, d.x, epsilon = 1e-6);
            assert_abs_diff_eq!(p.y, d.y, epsilon = 1e-6);
        }
    }

    #[test]
    fn four_points_are_enough() {
        let h = sample_h();
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let dst: Vec<_> = src.iter().map(|p| h.apply(*p)).collect();
        let est = estimate_homography(&src, &dst).unwrap();
        let p = est.apply(Point2::new(0.5, 0.25));
        let q = h.apply(Point2::new(0.5, 0.25));
        assert_abs_diff_eq!(p.x, q.x, epsilon = 1e-6);
        assert_abs_diff_eq!(p.y, q.y, epsilon = 1e-6);
    }

    #[test]
    fn inverse_maps_back() {
        let h = sample_h();
        let inv = h.inverse().unwrap();
        let p = Point2::new(0.3, -0.2);
        let back = inv.apply(h.apply(p));
        assert_abs_diff_eq!(back.x, p.x, epsilon = 1e-9);
        assert_abs_diff_eq!(back.y, p.y, epsilon = 1e-9);
    }

    #[test]
    fn rejects_too_few_or_colinear_points() {
        let pts = [Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 1.0)];
        assert!(estimate_homography(&pts, &pts).is_none());

        let line: Vec<_> = (0..6).map(|i| Point2::new(i as f64, 2.0 * i as f64)).collect();
        assert!(estimate_homography(&line, &line).is_none());
    }
}
