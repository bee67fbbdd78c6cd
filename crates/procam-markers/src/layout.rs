//! Deterministic tiling of a projector canvas with fiducial markers.
//!
//! The grid is derived from the canvas and marker size only:
//!
//! - `spacing = marker_size / 12`;
//! - `rows = (height - spacing) / (marker_size + spacing)`, same for `cols`;
//! - the marker block is centred, leaving `border_v` / `border_h` on each side;
//! - slots are walked row-major from the top-left border, a slot is used only
//!   while `offset + marker_size + spacing < extent`;
//! - ids start at `first_id` and advance for every slot, omitted or not.

use std::collections::BTreeSet;

use procam_core::GrayImage;
use serde::{Deserialize, Serialize};

use crate::render::WHITE;
use crate::{LayoutError, MarkerRegistry, MarkerRenderer};

pub const DEFAULT_MARKER_SIZE: u32 = 50;
pub const FIRST_MARKER_ID: u32 = 10;

fn default_marker_size() -> u32 {
    DEFAULT_MARKER_SIZE
}

fn default_first_id() -> u32 {
    FIRST_MARKER_ID
}

/// Canvas and marker parameters for one layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerLayoutParams {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_marker_size")]
    pub marker_size: u32,
    #[serde(default = "default_first_id")]
    pub first_id: u32,
    /// Ids whose slot is left blank.
    #[serde(default)]
    pub omit: BTreeSet<u32>,
}

impl MarkerLayoutParams {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            marker_size: DEFAULT_MARKER_SIZE,
            first_id: FIRST_MARKER_ID,
            omit: BTreeSet::new(),
        }
    }

    pub fn with_marker_size(mut self, marker_size: u32) -> Self {
        self.marker_size = marker_size;
        self
    }

    pub fn with_omit(mut self, omit: impl IntoIterator<Item = u32>) -> Self {
        self.omit = omit.into_iter().collect();
        self
    }
}

/// One placed marker: id and top-left canvas pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerSlot {
    pub id: u32,
    pub x: u32,
    pub y: u32,
}

/// Pure geometry of a layout, computed without rendering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerLayout {
    pub params: MarkerLayoutParams,
    pub spacing: u32,
    pub rows: i64,
    pub cols: i64,
    pub border_h: i64,
    pub border_v: i64,
    pub slots: Vec<MarkerSlot>,
}

impl MarkerLayout {
    pub fn compute(params: MarkerLayoutParams) -> Result<Self, LayoutError> {
        if params.width == 0 || params.height == 0 || params.marker_size == 0 {
            return Err(LayoutError::EmptyCanvas {
                width: params.width,
                height: params.height,
                marker_size: params.marker_size,
            });
        }

        let size = i64::from(params.marker_size);
        let width = i64::from(params.width);
        let height = i64::from(params.height);
        let spacing = size / 12;
        let step = size + spacing;

        let rows = (height - spacing).div_euclid(step);
        let cols = (width - spacing).div_euclid(step);
        let markers_h = rows * size + (rows - 1) * spacing;
        let markers_w = cols * size + (cols - 1) * spacing;
        let border_v = (height - markers_h).div_euclid(2);
        let border_h = (width - markers_w).div_euclid(2);

        let mut slots = Vec::new();
        let mut index: u32 = 0;
        let mut row = border_v;
        while row + size + spacing < height {
            let mut col = border_h;
            while col + size + spacing < width {
                let id = params
                    .first_id
                    .checked_add(index)
                    .ok_or(LayoutError::IdOverflow {
                        first_id: params.first_id,
                    })?;
                if !params.omit.contains(&id) && row >= 0 && col >= 0 {
                    slots.push(MarkerSlot {
                        id,
                        x: col as u32,
                        y: row as u32,
                    });
                }
                index = index.saturating_add(1);
                col += step;
            }
            row += step;
        }

        if slots.is_empty() {
            log::warn!(
                "no marker fits a {}x{} canvas with marker size {}",
                params.width,
                params.height,
                params.marker_size
            );
        }

        Ok(Self {
            params,
            spacing: spacing as u32,
            rows,
            cols,
            border_h,
            border_v,
            slots,
        })
    }

    /// Canvas corners of every placed marker.
    pub fn registry(&self) -> MarkerRegistry {
        let size = f64::from(self.params.marker_size);
        let mut reg = MarkerRegistry::new();
        for s in &self.slots {
            reg.insert(
                s.id,
                MarkerRegistry::square_corners(f64::from(s.x), f64::from(s.y), size),
            );
        }
        reg
    }

    /// White canvas with every placed marker drawn into its slot.
    pub fn render<R: MarkerRenderer + ?Sized>(&self, renderer: &R) -> Result<GrayImage, LayoutError> {
        let size = self.params.marker_size as usize;
        let mut canvas = GrayImage::new(
            self.params.width as usize,
            self.params.height as usize,
            WHITE,
        );
        for s in &self.slots {
            let tile = renderer.render(s.id, size)?;
            canvas.blit(&tile.view(), s.x as usize, s.y as usize);
        }
        Ok(canvas)
    }
}

/// Tile a canvas and return it with the registry of placed markers.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "info", skip(renderer)))]
pub fn generate<R: MarkerRenderer + ?Sized>(
    params: MarkerLayoutParams,
    renderer: &R,
) -> Result<(GrayImage, MarkerRegistry), LayoutError> {
    let layout = MarkerLayout::compute(params)?;
    let canvas = layout.render(renderer)?;
    log::info!(
        "marker layout {}x{}: {} markers ({}x{} grid, spacing {})",
        layout.params.width,
        layout.params.height,
        layout.slots.len(),
        layout.rows,
        layout.cols,
        layout.spacing
    );
    Ok((canvas, layout.registry()))
}
