//! Rasterizing single markers.

use procam_core::GrayImage;

use crate::dictionary::code_bit;
use crate::{Dictionary, LayoutError};

pub const BLACK: u8 = 0;
pub const WHITE: u8 = 255;

/// Draws one marker into a `size × size` tile.
pub trait MarkerRenderer {
    fn render(&self, id: u32, size: usize) -> Result<GrayImage, LayoutError>;
}

/// Rasterize an inner bit pattern surrounded by a one-module black border.
///
/// Each pixel samples the module it falls into, so sizes that are not a
/// multiple of `marker_size + 2` still produce a full tile.
pub fn render_code(code: u64, marker_size: usize, size: usize) -> GrayImage {
    let cells = marker_size + 2;
    let mut img = GrayImage::new(size, size, WHITE);
    for y in 0..size {
        let cy = y * cells / size;
        for x in 0..size {
            let cx = x * cells / size;
            let border = cy == 0 || cx == 0 || cy == cells - 1 || cx == cells - 1;
            let black = border || code_bit(code, marker_size, cy - 1, cx - 1);
            if black {
                img.put(x, y, BLACK);
            }
        }
    }
    img
}

/// Renders ids through a loaded [`Dictionary`].
#[derive(Clone, Debug)]
pub struct DictionaryRenderer {
    dict: Dictionary,
}

impl DictionaryRenderer {
    pub fn new(dict: Dictionary) -> Self {
        Self { dict }
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }
}

impl MarkerRenderer for DictionaryRenderer {
    fn render(&self, id: u32, size: usize) -> Result<GrayImage, LayoutError> {
        self.dict.validate()?;
        let code = self.dict.code(id).ok_or(LayoutError::UnknownMarkerId {
            id,
            available: self.dict.len(),
        })?;
        Ok(render_code(code, self.dict.marker_size, size))
    }
}

/// Dictionary-free renderer: the inner bits hold the id followed by a
/// 4-bit popcount checksum.
///
/// Useful for previews and for detectors that decode ids directly.
#[derive(Clone, Copy, Debug)]
pub struct IdBitsRenderer {
    pub marker_size: usize,
}

impl Default for IdBitsRenderer {
    fn default() -> Self {
        Self { marker_size: 6 }
    }
}

impl IdBitsRenderer {
    const CHECKSUM_BITS: usize = 4;

    /// Largest id that fits next to the checksum.
    pub fn max_id(&self) -> u32 {
        let payload = (self.marker_size * self.marker_size).saturating_sub(Self::CHECKSUM_BITS);
        if payload >= 32 {
            u32::MAX
        } else {
            (1u32 << payload).saturating_sub(1)
        }
    }

    pub fn code(&self, id: u32) -> Option<u64> {
        if id > self.max_id() || self.marker_size * self.marker_size > 64 {
            return None;
        }
        let checksum = u64::from(id.count_ones()) & 0xF;
        Some((u64::from(id) << Self::CHECKSUM_BITS) | checksum)
    }
}

impl MarkerRenderer for IdBitsRenderer {
    fn render(&self, id: u32, size: usize) -> Result<GrayImage, LayoutError> {
        let code = self.code(id).ok_or(LayoutError::UnknownMarkerId {
            id,
            available: self.max_id() as usize + 1,
        })?;
        Ok(render_code(code, self.marker_size, size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_is_black_and_bits_follow_code() {
        // 2x2 inner bits "10"/"01", 4 modules of 10 px.
        let img = render_code(0b1001, 2, 40);
        assert_eq!(img.get(0, 0), Some(BLACK));
        assert_eq!(img.get(39, 39), Some(BLACK));
        assert_eq!(img.get(15, 15), Some(BLACK)); // bit (0,0)
        assert_eq!(img.get(25, 15), Some(WHITE)); // bit (0,1)
        assert_eq!(img.get(15, 25), Some(WHITE)); // bit (1,0)
        assert_eq!(img.get(25, 25), Some(BLACK)); // bit (1,1)
    }

    #[test]
    fn dictionary_renderer_rejects_unknown_ids() {
        let r = DictionaryRenderer::new(Dictionary {
            name: "one".into(),
            marker_size: 4,
            max_correction_bits: 0,
            codes: vec![0xF00F],
        });
        assert!(r.render(0, 30).is_ok());
        assert_eq!(
            r.render(1, 30).unwrap_err(),
            LayoutError::UnknownMarkerId { id: 1, available: 1 }
        );
    }

    #[test]
    fn dictionary_renderer_rejects_oversized_markers() {
        let r = DictionaryRenderer::new(Dictionary {
            name: "9x9".into(),
            marker_size: 9,
            max_correction_bits: 0,
            codes: vec![1],
        });
        assert_eq!(
            r.render(0, 44).unwrap_err(),
            LayoutError::UnsupportedMarkerSize { marker_size: 9 }
        );
    }

    #[test]
    fn id_bits_are_distinct() {
        let r = IdBitsRenderer::default();
        assert_ne!(r.code(10), r.code(11));
        assert_eq!(r.code(5), Some((5 << 4) | 2));
        let a = r.render(10, 50).unwrap();
        let b = r.render(11, 50).unwrap();
        assert_ne!(a.data, b.data);
    }
}
