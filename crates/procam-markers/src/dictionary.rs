//! Dictionary metadata and packed marker codes.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{LayoutError, MarkerIoError};

/// An ArUco-style dictionary loaded at runtime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dictionary {
    /// Human-readable name (for debugging/logging).
    pub name: String,
    /// Marker side length (number of inner bits per side).
    pub marker_size: usize,
    /// Maximum error-correcting Hamming distance supported by the dictionary.
    #[serde(default)]
    pub max_correction_bits: u8,
    /// One `u64` per marker id, encoding the inner `marker_size × marker_size` bits.
    ///
    /// Bits are stored in row-major order with **black = 1**.
    pub codes: Vec<u64>,
}

impl Dictionary {
    /// Total number of inner bits per marker.
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.marker_size * self.marker_size
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    #[inline]
    pub fn code(&self, id: u32) -> Option<u64> {
        self.codes.get(id as usize).copied()
    }

    /// Codes are `u64`, so at most 8x8 inner bits.
    pub fn validate(&self) -> Result<(), LayoutError> {
        match self.marker_size.checked_mul(self.marker_size) {
            Some(bits) if (1..=64).contains(&bits) => Ok(()),
            _ => Err(LayoutError::UnsupportedMarkerSize {
                marker_size: self.marker_size,
            }),
        }
    }

    /// Load a dictionary from JSON (`{name, marker_size, max_correction_bits, codes}`).
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, MarkerIoError> {
        let raw = fs::read_to_string(path)?;
        let dict: Self = serde_json::from_str(&raw)?;
        dict.validate()?;
        Ok(dict)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), MarkerIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Bit `(row, col)` of a row-major packed code; out-of-range cells read as 0.
#[inline]
pub fn code_bit(code: u64, marker_size: usize, row: usize, col: usize) -> bool {
    let bits = marker_size * marker_size;
    let idx = row * marker_size + col;
    if bits > 64 || col >= marker_size || idx >= bits {
        return false;
    }
    (code >> (bits - 1 - idx)) & 1 == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_bit_is_most_significant() {
        // 2x2: rows "10" / "01"
        let code = 0b1001;
        assert!(code_bit(code, 2, 0, 0));
        assert!(!code_bit(code, 2, 0, 1));
        assert!(!code_bit(code, 2, 1, 0));
        assert!(code_bit(code, 2, 1, 1));
    }

    #[test]
    fn json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict.json");
        let dict = Dictionary {
            name: "tiny".into(),
            marker_size: 4,
            max_correction_bits: 1,
            codes: vec![0xBEEF, 0x1234],
        };
        dict.write_json(&path).unwrap();
        let back = Dictionary::load_json(&path).unwrap();
        assert_eq!(back, dict);
        assert_eq!(back.code(1), Some(0x1234));
        assert_eq!(back.code(2), None);
    }

    #[test]
    fn rejects_codes_wider_than_64_bits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict.json");
        std::fs::write(&path, r#"{"name":"9x9","marker_size":9,"codes":[1]}"#).unwrap();

        let err = Dictionary::load_json(&path).unwrap_err();
        assert!(matches!(
            err,
            MarkerIoError::Layout(LayoutError::UnsupportedMarkerSize { marker_size: 9 })
        ));

        assert!(!code_bit(u64::MAX, 9, 8, 8));
    }

    #[test]
    fn eight_by_eight_is_the_largest_size() {
        let dict = Dictionary {
            name: "8x8".into(),
            marker_size: 8,
            max_correction_bits: 0,
            codes: vec![1],
        };
        assert!(dict.validate().is_ok());
        assert!(code_bit(1, 8, 7, 7));
        assert!(!code_bit(1, 8, 0, 0));
    }
}
