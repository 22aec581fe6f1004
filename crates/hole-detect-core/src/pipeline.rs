use log::debug;
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

use crate::depth::DepthFrame;
use crate::hough::{detect_circles, CircleProfile, DetectedCircle, HoughParams};
use crate::image::{box_blur_3x3, threshold_binary_inv, GrayImageView};
use crate::intrinsics::Intrinsics;
use crate::project::project;

/// Per-frame detection settings.
///
/// The reference values are tuned for the simulated sensor; real cameras
/// need a different intensity cutoff (the simulation scene sits around 104,
/// real RGB around 120).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PipelineParams {
    /// Inverse-threshold cutoff; markers are darker than this.
    pub intensity_cutoff: u8,
    pub base_profile: CircleProfile,
    pub hole_profile: CircleProfile,
    pub hough: HoughParams,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            intensity_cutoff: 112,
            base_profile: CircleProfile {
                min_radius: 100.0,
                max_radius: 200.0,
            },
            hole_profile: CircleProfile {
                min_radius: 20.0,
                max_radius: 50.0,
            },
            hough: HoughParams::default(),
        }
    }
}

/// Hole position in the target (robot) frame.
///
/// `z` is the base marker's projected depth, not the hole's own: the hole's
/// apparent depth shifts with the viewing angle while the base plane stays
/// put.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HoleCoordinate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Markup primitives for the visualization collaborator. Producing these has
/// no effect on the detection state.
#[derive(Clone, Debug, PartialEq)]
pub enum OverlayShape {
    BaseOutline { cx: f32, cy: f32, radius: f32 },
    HoleOutline { cx: f32, cy: f32, radius: f32 },
    CenterMark { cx: f32, cy: f32 },
    Label { x: i32, y: i32, text: String },
}

/// Result of one colour-frame pass: the full replacement snapshot plus the
/// visualization markup.
#[derive(Clone, Debug, Default)]
pub struct DetectionOutcome {
    pub holes: Vec<HoleCoordinate>,
    pub overlays: Vec<OverlayShape>,
}

/// Detection preconditions that gate a frame.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineError {
    #[error("camera intrinsic parameters not captured yet")]
    IntrinsicsNotReady,
    #[error("camera extrinsic parameters not captured yet")]
    ExtrinsicsNotReady,
}

/// Pixel centre of a detected circle, rounded for the depth lookup. Negative
/// coordinates fold into an out-of-bounds index and are rejected by the
/// projection's bounds check.
fn pixel_index(value: f32) -> usize {
    let rounded = value.round();
    if rounded < 0.0 {
        usize::MAX
    } else {
        rounded as usize
    }
}

fn project_circle(
    circle: &DetectedCircle,
    depth: &DepthFrame,
    intrinsics: &Intrinsics,
    extrinsics: &Matrix4<f64>,
) -> Option<nalgebra::Point3<f64>> {
    project(
        pixel_index(circle.cx),
        pixel_index(circle.cy),
        depth,
        intrinsics,
        extrinsics,
    )
    .ok()
}

/// Run one colour frame through the full detection chain.
///
/// Steps: binarise + blur, detect base and hole circles, pick the base,
/// project every hole and pin its `z` to the base plane. An empty `holes`
/// sequence means no usable detection this frame; the caller replaces the
/// registry contents with it either way.
pub fn process_frame(
    gray: &GrayImageView<'_>,
    depth: &DepthFrame,
    intrinsics: &Intrinsics,
    extrinsics: &Matrix4<f64>,
    params: &PipelineParams,
) -> DetectionOutcome {
    let binary = threshold_binary_inv(gray, params.intensity_cutoff);
    let blurred = box_blur_3x3(&binary.view());

    let base_circles = detect_circles(&blurred.view(), &params.base_profile, &params.hough);
    let hole_circles = detect_circles(&blurred.view(), &params.hole_profile, &params.hough);
    debug!(
        "detected {} base candidate(s), {} hole candidate(s)",
        base_circles.len(),
        hole_circles.len()
    );

    let mut outcome = DetectionOutcome::default();

    // Only one base marker exists physically; among candidates that project
    // successfully the largest one is kept, which is deterministic where
    // iteration order is not.
    let base = base_circles
        .iter()
        .filter_map(|c| project_circle(c, depth, intrinsics, extrinsics).map(|p| (c, p)))
        .max_by(|(a, _), (b, _)| a.radius.total_cmp(&b.radius));

    let Some((base_circle, base_point)) = base else {
        return outcome;
    };
    outcome.overlays.push(OverlayShape::BaseOutline {
        cx: base_circle.cx,
        cy: base_circle.cy,
        radius: base_circle.radius,
    });

    for circle in &hole_circles {
        // A failed depth lookup skips the point, never the frame.
        let Some(point) = project_circle(circle, depth, intrinsics, extrinsics) else {
            continue;
        };
        let hole = HoleCoordinate {
            x: point.x,
            y: point.y,
            z: base_point.z,
        };
        outcome.holes.push(hole);

        outcome.overlays.push(OverlayShape::HoleOutline {
            cx: circle.cx,
            cy: circle.cy,
            radius: circle.radius,
        });
        outcome.overlays.push(OverlayShape::CenterMark {
            cx: circle.cx,
            cy: circle.cy,
        });
        let (lx, ly) = (circle.cx as i32 + 25, circle.cy as i32);
        outcome.overlays.push(OverlayShape::Label {
            x: lx,
            y: ly - 11,
            text: format!("x:{:.1}", hole.x),
        });
        outcome.overlays.push(OverlayShape::Label {
            x: lx,
            y: ly,
            text: format!("y:{:.1}", hole.y),
        });
        outcome.overlays.push(OverlayShape::Label {
            x: lx,
            y: ly + 11,
            text: format!("z:{:.1}", hole.z),
        });
    }

    outcome
}
