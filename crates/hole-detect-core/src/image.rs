#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
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
    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.data[y * self.width + x] = value;
    }
}

#[inline]
fn get_clamped(src: &GrayImageView<'_>, x: i64, y: i64) -> u8 {
    let x = x.clamp(0, src.width as i64 - 1) as usize;
    let y = y.clamp(0, src.height as i64 - 1) as usize;
    src.data[y * src.width + x]
}

/// Inverse binary threshold: pixels *below* `cutoff` become 255, the rest 0.
///
/// The markers are darker than the work-piece surface, so the inverse
/// threshold turns them into white blobs on a black background.
pub fn threshold_binary_inv(src: &GrayImageView<'_>, cutoff: u8) -> GrayImage {
    let mut out = GrayImage::new(src.width, src.height);
    for (dst, &px) in out.data.iter_mut().zip(src.data) {
        *dst = if px < cutoff { 255 } else { 0 };
    }
    out
}

/// 3x3 box filter with clamp-to-edge borders.
///
/// Softens the hard binary edges so the Sobel gradients used by the circle
/// detector get a usable direction, and suppresses single-pixel speckle.
pub fn box_blur_3x3(src: &GrayImageView<'_>) -> GrayImage {
    let mut out = GrayImage::new(src.width, src.height);
    for y in 0..src.height {
        for x in 0..src.width {
            let mut sum = 0u32;
            for dy in -1..=1i64 {
                for dx in -1..=1i64 {
                    sum += u32::from(get_clamped(src, x as i64 + dx, y as i64 + dy));
                }
            }
            out.set(x, y, (sum / 9) as u8);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_inverse() {
        let img = GrayImage {
            width: 3,
            height: 1,
            data: vec![0, 111, 112],
        };
        let bin = threshold_binary_inv(&img.view(), 112);
        assert_eq!(bin.data, vec![255, 255, 0]);
    }

    #[test]
    fn blur_averages_neighbourhood() {
        let mut img = GrayImage::new(5, 5);
        img.set(2, 2, 90);
        let blurred = box_blur_3x3(&img.view());
        assert_eq!(blurred.data[2 * 5 + 2], 10);
        assert_eq!(blurred.data[1 * 5 + 1], 10);
        assert_eq!(blurred.data[0], 0);
    }

    #[test]
    fn blur_clamps_at_borders() {
        let img = GrayImage {
            width: 2,
            height: 2,
            data: vec![90, 90, 90, 90],
        };
        let blurred = box_blur_3x3(&img.view());
        assert!(blurred.data.iter().all(|&p| p == 90));
    }
}
