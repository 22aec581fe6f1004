use std::sync::{Arc, Mutex, PoisonError};

/// Depth samples on the same pixel grid as the colour image, row-major.
///
/// Units pass through unchanged: whatever the sensor reports is what the
/// projection returns.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthFrame {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl DepthFrame {
    /// Build a frame from a row-major buffer. Returns `None` when the buffer
    /// length does not match `width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Option<Self> {
        (data.len() == width * height).then_some(Self {
            width,
            height,
            data,
        })
    }

    /// Frame filled with a single depth value.
    pub fn constant(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Zero-sized frame; every lookup on it is out of bounds.
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            data: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Depth at pixel column `u`, row `v`. The bounds test and the index use
    /// the same axis convention: `u` against width, `v` against height.
    #[inline]
    pub fn get(&self, u: usize, v: usize) -> Option<f32> {
        (u < self.width && v < self.height).then(|| self.data[v * self.width + u])
    }

    #[inline]
    pub fn set(&mut self, u: usize, v: usize, value: f32) {
        if u < self.width && v < self.height {
            self.data[v * self.width + u] = value;
        }
    }
}

/// Latest-wins shared handle to the most recent depth frame.
///
/// The writer swaps in a fresh `Arc`; an in-flight detection keeps its clone
/// of the previous frame, so it never observes a torn buffer.
#[derive(Debug, Default)]
pub struct DepthCache {
    slot: Mutex<Option<Arc<DepthFrame>>>,
}

impl DepthCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, frame: DepthFrame) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(frame));
    }

    pub fn latest(&self) -> Option<Arc<DepthFrame>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_is_bounds_checked() {
        let frame = DepthFrame::constant(4, 3, 1.5);
        assert_eq!(frame.get(3, 2), Some(1.5));
        assert_eq!(frame.get(4, 0), None);
        assert_eq!(frame.get(0, 3), None);
        assert_eq!(DepthFrame::empty().get(0, 0), None);
    }

    #[test]
    fn index_order_is_row_v_col_u() {
        let mut data = vec![0.0; 6];
        data[1 * 3 + 2] = 7.0; // u = 2, v = 1 on a 3x2 grid
        let frame = DepthFrame::from_vec(3, 2, data).expect("dims match");
        assert_eq!(frame.get(2, 1), Some(7.0));
        assert_eq!(frame.get(1, 2), None);
    }

    #[test]
    fn from_vec_rejects_bad_length() {
        assert!(DepthFrame::from_vec(3, 2, vec![0.0; 5]).is_none());
    }

    #[test]
    fn cache_keeps_latest_frame() {
        let cache = DepthCache::new();
        assert!(cache.latest().is_none());
        cache.store(DepthFrame::constant(2, 2, 1.0));
        cache.store(DepthFrame::constant(2, 2, 2.0));
        let latest = cache.latest().expect("stored");
        assert_eq!(latest.get(0, 0), Some(2.0));
    }

    #[test]
    fn reader_keeps_old_frame_across_swap() {
        let cache = DepthCache::new();
        cache.store(DepthFrame::constant(2, 2, 1.0));
        let held = cache.latest().expect("stored");
        cache.store(DepthFrame::constant(2, 2, 2.0));
        assert_eq!(held.get(0, 0), Some(1.0));
        assert_eq!(cache.latest().expect("stored").get(0, 0), Some(2.0));
    }
}
