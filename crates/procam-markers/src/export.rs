//! PNG export of canvases.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use procam_core::GrayImage;

use crate::MarkerIoError;

/// Encode an 8-bit grayscale image as PNG into `out`.
pub fn encode_png<W: Write>(out: W, img: &GrayImage) -> Result<(), MarkerIoError> {
    let mut encoder = png::Encoder::new(out, img.width as u32, img.height as u32);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&img.data)?;
    writer.finish()?;
    Ok(())
}

/// Write an 8-bit grayscale PNG file.
pub fn write_png(path: impl AsRef<Path>, img: &GrayImage) -> Result<(), MarkerIoError> {
    let file = File::create(path)?;
    encode_png(BufWriter::new(file), img)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_signature_is_written() {
        let mut buf = Vec::new();
        encode_png(&mut buf, &GrayImage::new(8, 4, 200)).unwrap();
        assert_eq!(&buf[..8], b"\x89PNG\r\n\x1a\n");
    }
}
