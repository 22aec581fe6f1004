use std::path::Path;

use serde::{Deserialize, Serialize};

use hole_detect_core::{PipelineParams, RetryPolicy};

/// Node-level configuration: frame names, calibration timing and the
/// detection parameters.
///
/// Defaults mirror the simulated wrist-mounted RGBD sensor setup.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Camera optical frame the detections start in.
    pub source_frame: String,
    /// Robot frame the hole coordinates are reported in.
    pub target_frame: String,
    /// Bounded wait for one transform lookup, seconds.
    pub transform_wait_s: f64,
    pub retry: RetryPolicy,
    pub pipeline: PipelineParams,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            source_frame: "wrist_rgbd_camera_depth_optical_frame".to_owned(),
            target_frame: "base_link".to_owned(),
            transform_wait_s: 5.0,
            retry: RetryPolicy::default(),
            pipeline: PipelineParams::default(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl NodeConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_setup() {
        let config = NodeConfig::default();
        assert_eq!(config.target_frame, "base_link");
        assert_eq!(config.transform_wait_s, 5.0);
        assert_eq!(config.pipeline.intensity_cutoff, 112);
        assert_eq!(config.pipeline.base_profile.min_radius, 100.0);
        assert_eq!(config.pipeline.hole_profile.max_radius, 50.0);
        assert_eq!(config.pipeline.hough.accumulator_threshold, 0.8);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: NodeConfig =
            serde_json::from_str(r#"{"target_frame": "world", "transform_wait_s": 2.5}"#)
                .expect("parses");
        assert_eq!(config.target_frame, "world");
        assert_eq!(config.transform_wait_s, 2.5);
        assert_eq!(config.source_frame, "wrist_rgbd_camera_depth_optical_frame");
        assert_eq!(config.pipeline.intensity_cutoff, 112);
    }

    #[test]
    fn round_trips_through_json() {
        let config = NodeConfig::default();
        let text = serde_json::to_string(&config).expect("serialises");
        let back: NodeConfig = serde_json::from_str(&text).expect("parses");
        assert_eq!(back.source_frame, config.source_frame);
        assert_eq!(back.retry.max_attempts, config.retry.max_attempts);
    }
}
