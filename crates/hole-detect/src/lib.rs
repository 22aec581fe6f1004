//! Runtime surface for depth-camera hole localisation.
//!
//! This crate wires the transport-free geometry core (`hole-detect-core`)
//! to whatever runtime delivers camera data:
//! - [`HoleDetectorNode`] owns the per-process state (write-once intrinsics
//!   and extrinsics, latest-wins depth cache, hole registry) and exposes one
//!   entry point per external feed,
//! - [`AnnotatedImageSink`] is the fire-and-forget visualization seam,
//! - `render_overlays` rasterises detection markup onto an RGB frame,
//! - the `hole-detect` bin (feature `cli`, on by default) runs the pipeline
//!   offline on a PNG plus a synthetic or raw depth grid.
//!
//! ## Quickstart
//!
//! ```no_run
//! use hole_detect::{HoleDetectorNode, NodeConfig};
//! use hole_detect_core::DepthFrame;
//! use nalgebra::Matrix3;
//!
//! let node = HoleDetectorNode::new(NodeConfig::default());
//! // node.calibrate(&transform_provider)?; // once, at start-up
//! node.on_camera_info(&Matrix3::new(500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0));
//! node.on_depth_frame(DepthFrame::constant(640, 480, 1000.0));
//! // node.on_color_frame(&rgb)?; // per colour frame
//! let response = node.query();
//! println!("success: {}", response.success);
//! ```

pub use hole_detect_core as core;

mod annotate;
mod config;
mod node;

pub use annotate::render_overlays;
pub use config::{ConfigError, NodeConfig};
pub use node::{luma_from_rgb, AnnotatedImageSink, HoleDetectorNode};

pub use hole_detect_core::{
    DepthFrame, HoleCoordinate, Intrinsics, PipelineError, PipelineParams, QueryResponse,
    RigidTransform, TransformProvider,
};
