//! World/image point pairs collected per calibration view.

use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Parallel world and image points observed in a single view.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceSet {
    world: Vec<Point3<f64>>,
    image: Vec<Point2<f64>>,
}

impl CorrespondenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            world: Vec::with_capacity(n),
            image: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, world: Point3<f64>, image: Point2<f64>) {
        self.world.push(world);
        self.image.push(image);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.world.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.world.is_empty()
    }

    #[inline]
    pub fn world_points(&self) -> &[Point3<f64>] {
        &self.world
    }

    #[inline]
    pub fn image_points(&self) -> &[Point2<f64>] {
        &self.image
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Point3<f64>, &Point2<f64>)> + '_ {
        self.world.iter().zip(self.image.iter())
    }
}

impl FromIterator<(Point3<f64>, Point2<f64>)> for CorrespondenceSet {
    fn from_iter<I: IntoIterator<Item = (Point3<f64>, Point2<f64>)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (w, i) in iter {
            set.push(w, i);
        }
        set
    }
}

/// Ordered list of views; grows by one view per accepted capture.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceAccumulator {
    views: Vec<CorrespondenceSet>,
}

impl CorrespondenceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_view(&mut self, set: CorrespondenceSet) {
        self.views.push(set);
    }

    #[inline]
    pub fn views(&self) -> &[CorrespondenceSet] {
        &self.views
    }

    #[inline]
    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn point_count(&self) -> usize {
        self.views.iter().map(CorrespondenceSet::len).sum()
    }

    pub fn clear(&mut self) {
        self.views.clear();
    }
}
