use std::sync::OnceLock;

use log::info;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// Pinhole camera parameters.
///
/// ```text
///     [fx  0 cx]
/// K = [ 0 fy cy]
///     [ 0  0  1]
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Intrinsics {
    pub fn from_matrix(k: &Matrix3<f64>) -> Self {
        Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        }
    }
}

/// Write-once holder for the camera intrinsics.
///
/// The first capture wins; the camera-info feed can be torn down afterwards
/// and later deliveries are ignored.
#[derive(Debug, Default)]
pub struct IntrinsicStore {
    cell: OnceLock<Intrinsics>,
}

impl IntrinsicStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture intrinsics from a 3x3 camera matrix. Returns `true` when this
    /// call performed the capture, `false` when one already happened.
    pub fn capture(&self, k: &Matrix3<f64>) -> bool {
        let captured = self.cell.set(Intrinsics::from_matrix(k)).is_ok();
        if captured {
            info!("intrinsic parameters captured");
        }
        captured
    }

    pub fn get(&self) -> Option<Intrinsics> {
        self.cell.get().copied()
    }

    pub fn is_ready(&self) -> bool {
        self.cell.get().is_some()
    }
}
