use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use image::RgbImage;
use log::warn;
use nalgebra::{Matrix3, Matrix4};

use hole_detect_core::{
    acquire_extrinsics, process_frame, CalibrationError, DepthCache, DepthFrame, GrayImage,
    HoleRegistry, IntrinsicStore, PipelineError, QueryResponse, TransformProvider,
};

use crate::annotate::render_overlays;
use crate::config::NodeConfig;

/// Receives the colour frame overlaid with detection markup. Fire-and-forget:
/// the node never reads anything back.
pub trait AnnotatedImageSink: Send + Sync {
    fn publish(&self, frame: &RgbImage);
}

/// Per-process detection state and the entry points the surrounding runtime
/// calls into.
///
/// All entry points take `&self`; the contained state is interior-mutable and
/// safe to drive from independent execution contexts. Intrinsics and
/// extrinsics are write-once, the depth cache is latest-wins, and the hole
/// registry is swapped wholesale per colour frame.
pub struct HoleDetectorNode {
    config: NodeConfig,
    intrinsics: IntrinsicStore,
    extrinsics: OnceLock<Matrix4<f64>>,
    depth: DepthCache,
    registry: HoleRegistry,
    cancel: AtomicBool,
    sink: Option<Box<dyn AnnotatedImageSink>>,
}

impl HoleDetectorNode {
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            intrinsics: IntrinsicStore::new(),
            extrinsics: OnceLock::new(),
            depth: DepthCache::new(),
            registry: HoleRegistry::new(),
            cancel: AtomicBool::new(false),
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn AnnotatedImageSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Acquire and freeze the camera-to-target extrinsic transform.
    ///
    /// Meant to run once at start-up, before any colour frame is processed.
    /// Retries with backoff per the configured policy; a no-op once a
    /// transform has been frozen.
    pub fn calibrate(&self, provider: &dyn TransformProvider) -> Result<(), CalibrationError> {
        if self.extrinsics.get().is_some() {
            return Ok(());
        }
        let h = acquire_extrinsics(
            provider,
            &self.config.target_frame,
            &self.config.source_frame,
            Duration::from_secs_f64(self.config.transform_wait_s),
            &self.config.retry,
            &self.cancel,
        )?;
        let _ = self.extrinsics.set(h);
        Ok(())
    }

    /// Ask a pending or future `calibrate` call to give up.
    pub fn cancel_calibration(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_calibrated(&self) -> bool {
        self.extrinsics.get().is_some()
    }

    /// Capture intrinsics from the camera-info feed. The first delivery wins
    /// and the feed can be unsubscribed once this returns `true`.
    pub fn on_camera_info(&self, camera_matrix: &Matrix3<f64>) -> bool {
        self.intrinsics.capture(camera_matrix)
    }

    /// Cache the newest depth frame, replacing any previous one.
    pub fn on_depth_frame(&self, frame: DepthFrame) {
        self.depth.store(frame);
    }

    /// Run detection on a colour frame and publish the replacement snapshot.
    ///
    /// Drops the frame (with a warning, no registry mutation) while the
    /// calibration preconditions are unmet. Returns the number of holes in
    /// the published snapshot.
    pub fn on_color_frame(&self, frame: &RgbImage) -> Result<usize, PipelineError> {
        let Some(extrinsics) = self.extrinsics.get() else {
            warn!("camera extrinsic parameters not loaded yet, dropping frame");
            return Err(PipelineError::ExtrinsicsNotReady);
        };
        let Some(intrinsics) = self.intrinsics.get() else {
            warn!("camera intrinsic parameters not loaded yet, dropping frame");
            return Err(PipelineError::IntrinsicsNotReady);
        };

        // Without a cached depth frame every projection is out of bounds and
        // the snapshot degrades to empty, same as the no-valid-base case.
        let depth = self
            .depth
            .latest()
            .unwrap_or_else(|| Arc::new(DepthFrame::empty()));

        let gray = luma_from_rgb(frame);
        let outcome = process_frame(
            &gray.view(),
            &depth,
            &intrinsics,
            extrinsics,
            &self.config.pipeline,
        );
        let count = outcome.holes.len();
        self.registry.replace(outcome.holes);

        if let Some(sink) = &self.sink {
            let mut annotated = frame.clone();
            render_overlays(&mut annotated, &outcome.overlays);
            sink.publish(&annotated);
        }

        Ok(count)
    }

    /// Read-only snapshot for query callers; `success` is `false` when the
    /// last processed frame produced no holes.
    pub fn query(&self) -> QueryResponse {
        self.registry.query()
    }
}

/// BT.601 luma conversion from an RGB frame to the core's grayscale grid.
pub fn luma_from_rgb(frame: &RgbImage) -> GrayImage {
    let (width, height) = frame.dimensions();
    let mut out = GrayImage::new(width as usize, height as usize);
    for (x, y, px) in frame.enumerate_pixels() {
        let [r, g, b] = px.0;
        let luma = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
        out.set(x as usize, y as usize, luma.round().clamp(0.0, 255.0) as u8);
    }
    out
}
