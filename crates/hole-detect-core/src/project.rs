use nalgebra::{Matrix4, Point3, Vector4};

use crate::depth::DepthFrame;
use crate::intrinsics::Intrinsics;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("pixel ({u}, {v}) outside depth frame ({width}x{height})")]
    OutOfBounds {
        u: usize,
        v: usize,
        width: usize,
        height: usize,
    },
}

/// Back-project pixel `(u, v)` into the target frame.
///
/// Pinhole model: `x = z (u - cx) / fx`, `y = z (v - cy) / fy`, `z` sampled
/// from the depth frame at column `u`, row `v`, then mapped through the
/// homogeneous extrinsic matrix. Pure function; depth units pass through
/// unchanged.
pub fn project(
    u: usize,
    v: usize,
    depth: &DepthFrame,
    intrinsics: &Intrinsics,
    extrinsics: &Matrix4<f64>,
) -> Result<Point3<f64>, ProjectionError> {
    let z = depth.get(u, v).ok_or(ProjectionError::OutOfBounds {
        u,
        v,
        width: depth.width(),
        height: depth.height(),
    })? as f64;

    let x = z * (u as f64 - intrinsics.cx) / intrinsics.fx;
    let y = z * (v as f64 - intrinsics.cy) / intrinsics.fy;

    let world = extrinsics * Vector4::new(x, y, z, 1.0);
    Ok(Point3::new(world.x, world.y, world.z))
}
