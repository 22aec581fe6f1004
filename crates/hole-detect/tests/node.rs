use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use approx::assert_relative_eq;
use image::{Rgb, RgbImage};
use nalgebra::Matrix3;

use hole_detect::{AnnotatedImageSink, HoleDetectorNode, NodeConfig};
use hole_detect_core::{
    DepthFrame, PipelineError, RigidTransform, TransformLookupError, TransformProvider,
};

struct IdentityProvider;

impl TransformProvider for IdentityProvider {
    fn lookup(
        &self,
        _target: &str,
        _source: &str,
        _timeout: Duration,
    ) -> Result<RigidTransform, TransformLookupError> {
        Ok(RigidTransform::identity())
    }
}

#[derive(Clone, Default)]
struct CountingSink {
    published: Arc<AtomicUsize>,
}

impl AnnotatedImageSink for CountingSink {
    fn publish(&self, _frame: &RgbImage) {
        self.published.fetch_add(1, Ordering::SeqCst);
    }
}

fn camera_matrix() -> Matrix3<f64> {
    Matrix3::new(500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0)
}

fn fill_disc(img: &mut RgbImage, cx: f32, cy: f32, r: f32, value: u8) {
    let r_sq = r * r;
    for y in 0..img.height() {
        for x in 0..img.width() {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            if dx * dx + dy * dy <= r_sq {
                img.put_pixel(x, y, Rgb([value, value, value]));
            }
        }
    }
}

/// Bright work-piece with a dark base plate and bright holes through it.
fn scene(base: Option<(f32, f32, f32)>, holes: &[(f32, f32, f32)]) -> RgbImage {
    let mut img = RgbImage::from_pixel(640, 480, Rgb([200, 200, 200]));
    if let Some((cx, cy, r)) = base {
        fill_disc(&mut img, cx, cy, r, 40);
    }
    for &(cx, cy, r) in holes {
        fill_disc(&mut img, cx, cy, r, 200);
    }
    img
}

fn fast_config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.retry.initial_backoff_s = 0.0;
    config.retry.max_backoff_s = 0.0;
    config
}

#[test]
fn frames_are_dropped_until_calibrated() {
    let node = HoleDetectorNode::new(fast_config());
    let frame = scene(Some((400.0, 300.0, 150.0)), &[(420.0, 300.0, 30.0)]);

    assert_eq!(
        node.on_color_frame(&frame),
        Err(PipelineError::ExtrinsicsNotReady)
    );

    node.calibrate(&IdentityProvider).expect("calibration");
    assert!(node.is_calibrated());
    assert_eq!(
        node.on_color_frame(&frame),
        Err(PipelineError::IntrinsicsNotReady)
    );

    // Nothing was written while the preconditions were unmet.
    assert!(!node.query().success);
}

#[test]
fn end_to_end_detection_and_query() {
    let sink = CountingSink::default();
    let published = Arc::clone(&sink.published);
    let node = HoleDetectorNode::new(fast_config()).with_sink(Box::new(sink));

    node.calibrate(&IdentityProvider).expect("calibration");
    assert!(node.on_camera_info(&camera_matrix()));
    node.on_depth_frame(DepthFrame::constant(640, 480, 1000.0));

    let frame = scene(Some((400.0, 300.0, 150.0)), &[(420.0, 300.0, 30.0)]);
    let count = node.on_color_frame(&frame).expect("frame processed");
    assert_eq!(count, 1);
    assert_eq!(published.load(Ordering::SeqCst), 1);

    let response = node.query();
    assert!(response.success);
    assert_eq!(response.coordinates.len(), 1);
    let hole = response.coordinates[0];
    assert_relative_eq!(hole.x, 200.0, epsilon = 5.0);
    assert_relative_eq!(hole.y, 120.0, epsilon = 5.0);
    assert_relative_eq!(hole.z, 1000.0, epsilon = 1e-9);
}

#[test]
fn snapshot_reflects_only_the_latest_frame() {
    let node = HoleDetectorNode::new(fast_config());
    node.calibrate(&IdentityProvider).expect("calibration");
    node.on_camera_info(&camera_matrix());
    node.on_depth_frame(DepthFrame::constant(640, 480, 1000.0));

    let with_holes = scene(Some((400.0, 300.0, 150.0)), &[(420.0, 300.0, 30.0)]);
    assert_eq!(node.on_color_frame(&with_holes), Ok(1));
    assert!(node.query().success);

    // The base marker left the field of view: the snapshot is replaced with
    // an empty one, not accumulated.
    let without_base = scene(None, &[(420.0, 300.0, 30.0)]);
    assert_eq!(node.on_color_frame(&without_base), Ok(0));
    let response = node.query();
    assert!(!response.success);
    assert!(response.coordinates.is_empty());
}

#[test]
fn missing_depth_degrades_to_empty_snapshot() {
    let node = HoleDetectorNode::new(fast_config());
    node.calibrate(&IdentityProvider).expect("calibration");
    node.on_camera_info(&camera_matrix());

    let frame = scene(Some((400.0, 300.0, 150.0)), &[(420.0, 300.0, 30.0)]);
    assert_eq!(node.on_color_frame(&frame), Ok(0));
    assert!(!node.query().success);
}

#[test]
fn second_camera_info_is_ignored() {
    let node = HoleDetectorNode::new(fast_config());
    assert!(node.on_camera_info(&camera_matrix()));
    let other = Matrix3::new(1.0, 0.0, 2.0, 0.0, 3.0, 4.0, 0.0, 0.0, 1.0);
    assert!(!node.on_camera_info(&other));
}
