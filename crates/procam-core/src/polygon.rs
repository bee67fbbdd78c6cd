//! Inclusive point-in-polygon tests used to assign markers to surfaces.

use nalgebra::Point2;

const ON_EDGE_EPS: f64 = 1e-9;

fn on_segment(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> bool {
    let ab = b - a;
    let ap = p - a;
    let cross = ab.x * ap.y - ab.y * ap.x;
    let scale = ab.norm().max(1.0);
    if cross.abs() > ON_EDGE_EPS * scale {
        return false;
    }
    let dot = ap.dot(&ab);
    dot >= -ON_EDGE_EPS && dot <= ab.norm_squared() + ON_EDGE_EPS
}

/// True when `p` lies inside `polygon` or on its boundary.
///
/// The polygon is closed implicitly (last vertex connects to the first) and
/// may be convex or concave. Fewer than three vertices contain nothing.
pub fn point_in_polygon(polygon: &[Point2<f64>], p: &Point2<f64>) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (&polygon[i], &polygon[j]);
        if on_segment(p, a, b) {
            return true;
        }
        // Even-odd crossing rule on a horizontal ray towards +x.
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// True when every corner is inside (or on the boundary of) `polygon`.
pub fn contains_all_corners(polygon: &[Point2<f64>], corners: &[Point2<f64>]) -> bool {
    corners.iter().all(|c| point_in_polygon(polygon, c))
}
