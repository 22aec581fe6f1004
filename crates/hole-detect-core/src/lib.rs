//! Core geometry and detection for depth-camera hole localisation.
//!
//! This crate is intentionally transport-free. It does *not* depend on any
//! middleware or concrete image container: callers hand in borrowed pixel
//! grids and get back hole coordinates in the robot (target) frame.
//!
//! The processing chain per colour frame is:
//! 1. binarise (inverse threshold, markers are dark) and box-blur the image,
//! 2. run the gradient Hough circle detector twice (base marker profile,
//!    hole marker profile),
//! 3. back-project pixel centres through the pinhole model using the cached
//!    depth frame,
//! 4. map camera-frame points into the target frame with the start-up
//!    extrinsic transform and publish a whole-sequence snapshot.

mod depth;
mod extrinsics;
mod hough;
mod image;
mod intrinsics;
mod logger;
mod pipeline;
mod project;
mod registry;

pub use depth::{DepthCache, DepthFrame};
pub use extrinsics::{
    acquire_extrinsics, CalibrationError, RetryPolicy, RigidTransform, TransformLookupError,
    TransformProvider,
};
pub use hough::{detect_circles, CircleProfile, DetectedCircle, HoughParams};
pub use image::{box_blur_3x3, threshold_binary_inv, GrayImage, GrayImageView};
pub use intrinsics::{IntrinsicStore, Intrinsics};
pub use logger::init_with_level;
pub use pipeline::{
    process_frame, DetectionOutcome, HoleCoordinate, OverlayShape, PipelineError, PipelineParams,
};
pub use project::{project, ProjectionError};
pub use registry::{HoleRegistry, QueryResponse};
