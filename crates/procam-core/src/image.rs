/// Borrowed 8-bit grayscale image.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

impl GrayImageView<'_> {
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.width + x).copied()
    }
}

/// Owned 8-bit grayscale image (camera frames, projector canvases).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Uniform image filled with `value`.
    pub fn new(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        self.view().get(x, y)
    }

    /// Set one pixel; out-of-bounds writes are ignored.
    #[inline]
    pub fn put(&mut self, x: usize, y: usize, value: u8) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }

    /// Fill the axis-aligned rectangle `[x, x+w) × [y, y+h)`, clipped to the image.
    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, value: u8) {
        let x1 = (x + w).min(self.width);
        let y1 = (y + h).min(self.height);
        for yy in y.min(y1)..y1 {
            let row = yy * self.width;
            self.data[row + x.min(x1)..row + x1].fill(value);
        }
    }

    /// Copy `src` with its top-left corner at `(x, y)`, clipped to the image.
    pub fn blit(&mut self, src: &GrayImageView<'_>, x: usize, y: usize) {
        let w = src.width.min(self.width.saturating_sub(x));
        let h = src.height.min(self.height.saturating_sub(y));
        for row in 0..h {
            let s = row * src.width;
            let d = (y + row) * self.width + x;
            self.data[d..d + w].copy_from_slice(&src.data[s..s + w]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_rect_is_clipped() {
        let mut img = GrayImage::new(4, 3, 255);
        img.fill_rect(2, 1, 10, 10, 0);
        assert_eq!(img.data, vec![255, 255, 255, 255, 255, 255, 0, 0, 255, 255, 0, 0]);
    }

    #[test]
    fn blit_copies_and_clips() {
        let mut dst = GrayImage::new(3, 3, 9);
        let src = GrayImage {
            width: 2,
            height: 2,
            data: vec![1, 2, 3, 4],
        };
        dst.blit(&src.view(), 2, 1);
        assert_eq!(dst.get(2, 1), Some(1));
        assert_eq!(dst.get(2, 2), Some(3));
        assert_eq!(dst.get(1, 1), Some(9));
        assert_eq!(dst.get(3, 1), None);
    }
}
