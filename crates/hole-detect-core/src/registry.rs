use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::pipeline::HoleCoordinate;

/// Response handed to query callers. An empty registry is reported with
/// `success = false`, never as an error.
#[derive(Clone, Debug, Default, Serialize)]
pub struct QueryResponse {
    pub success: bool,
    pub coordinates: Vec<HoleCoordinate>,
}

/// Shared snapshot of the most recent frame's hole positions.
///
/// Writers replace the whole sequence in one swap under the lock, so readers
/// observe either the previous snapshot in full or the new one in full. The
/// lock is held for O(holes), not for the detection computation.
#[derive(Debug, Default)]
pub struct HoleRegistry {
    holes: Mutex<Vec<HoleCoordinate>>,
}

impl HoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registry contents with this frame's snapshot. Never merges
    /// with previous frames; an empty vector clears the registry.
    pub fn replace(&self, holes: Vec<HoleCoordinate>) {
        let mut guard = self.holes.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = holes;
    }

    pub fn snapshot(&self) -> Vec<HoleCoordinate> {
        self.holes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn query(&self) -> QueryResponse {
        let coordinates = self.snapshot();
        QueryResponse {
            success: !coordinates.is_empty(),
            coordinates,
        }
    }
}
