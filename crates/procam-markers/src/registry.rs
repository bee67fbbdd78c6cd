//! Canvas-space corners of every projected marker.

use std::collections::BTreeMap;
use std::{fs, path::Path};

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::MarkerIoError;

/// Marker corners in canvas pixels, ordered TL, TR, BR, BL.
pub type MarkerCorners = [Point2<f64>; 4];

/// Map from marker id to its canvas corners.
///
/// Built once per session by the layout generator and read-only afterwards.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerRegistry {
    markers: BTreeMap<u32, MarkerCorners>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Corners of an axis-aligned `size × size` marker whose top-left is `(x, y)`.
    pub fn square_corners(x: f64, y: f64, size: f64) -> MarkerCorners {
        [
            Point2::new(x, y),
            Point2::new(x + size, y),
            Point2::new(x + size, y + size),
            Point2::new(x, y + size),
        ]
    }

    pub fn insert(&mut self, id: u32, corners: MarkerCorners) -> Option<MarkerCorners> {
        self.markers.insert(id, corners)
    }

    #[inline]
    pub fn get(&self, id: u32) -> Option<&MarkerCorners> {
        self.markers.get(&id)
    }

    #[inline]
    pub fn contains(&self, id: u32) -> bool {
        self.markers.contains_key(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.markers.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &MarkerCorners)> + '_ {
        self.markers.iter().map(|(id, c)| (*id, c))
    }

    /// Load a registry from JSON.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, MarkerIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this registry to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), MarkerIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
