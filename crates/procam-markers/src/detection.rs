//! Contracts for external marker and calibration-board detectors.
//!
//! No detector is implemented here; capture loops are generic over these
//! traits so any vision backend (or a synthetic one in tests) can be plugged in.

use nalgebra::{Point2, Point3};
use procam_core::GrayImageView;
use serde::{Deserialize, Serialize};

/// One decoded marker with image corners ordered TL, TR, BR, BL.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerDetection {
    pub id: u32,
    pub corners: [Point2<f64>; 4],
}

/// Per-frame output of a calibration-board detector.
///
/// `object_points` are in the board frame (metres) and parallel to
/// `image_points`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardDetection {
    pub ids: Vec<u32>,
    pub object_points: Vec<Point3<f64>>,
    pub image_points: Vec<Point2<f64>>,
    #[serde(default)]
    pub markers: Vec<MarkerDetection>,
}

impl BoardDetection {
    #[inline]
    pub fn id_count(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.object_points.is_empty()
    }
}

/// Finds fiducial markers in a frame. Must be deterministic per image.
pub trait MarkerDetector {
    fn detect(&self, image: &GrayImageView<'_>) -> Vec<MarkerDetection>;
}

/// Finds a calibration board in a frame. Must be deterministic per image.
pub trait BoardDetector {
    fn detect_board(&self, image: &GrayImageView<'_>) -> BoardDetection;
}

impl<T: MarkerDetector + ?Sized> MarkerDetector for &T {
    fn detect(&self, image: &GrayImageView<'_>) -> Vec<MarkerDetection> {
        (**self).detect(image)
    }
}

impl<T: BoardDetector + ?Sized> BoardDetector for &T {
    fn detect_board(&self, image: &GrayImageView<'_>) -> BoardDetection {
        (**self).detect_board(image)
    }
}
