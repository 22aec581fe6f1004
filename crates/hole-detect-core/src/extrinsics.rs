use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{info, warn};
use nalgebra::{Matrix4, Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Rigid transform between two named frames: translation plus a unit
/// quaternion in scalar-first `(w, x, y, z)` order.
#[derive(Clone, Copy, Debug)]
pub struct RigidTransform {
    pub translation: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl RigidTransform {
    /// Build from a translation and a scalar-first quaternion. The quaternion
    /// is renormalised, so slightly denormalised sensor output is accepted.
    pub fn from_parts(translation: Vector3<f64>, quat_wxyz: [f64; 4]) -> Self {
        let [w, x, y, z] = quat_wxyz;
        Self {
            translation,
            rotation: UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)),
        }
    }

    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// 4x4 homogeneous matrix `[[R, t], [0, 0, 0, 1]]`.
    pub fn to_homogeneous(&self) -> Matrix4<f64> {
        let mut h = Matrix4::identity();
        h.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(self.rotation.to_rotation_matrix().matrix());
        h.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        h
    }
}

#[derive(thiserror::Error, Debug)]
#[error("{0}")]
pub struct TransformLookupError(pub String);

/// Supplies the rigid transform between two named frames, waiting up to
/// `timeout` for it to become available.
pub trait TransformProvider {
    fn lookup(
        &self,
        target_frame: &str,
        source_frame: &str,
        timeout: Duration,
    ) -> Result<RigidTransform, TransformLookupError>;
}

/// Errors from the start-up extrinsic acquisition.
#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error(
        "transform {target_frame} <- {source_frame} unavailable after {attempts} attempts: {reason}"
    )]
    Unavailable {
        target_frame: String,
        source_frame: String,
        attempts: u32,
        reason: String,
    },
    #[error("extrinsic acquisition cancelled")]
    Cancelled,
}

/// Bounded retry schedule for the transform lookup.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled after every failure.
    pub initial_backoff_s: f64,
    pub max_backoff_s: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff_s: 0.5,
            max_backoff_s: 5.0,
        }
    }
}

/// Acquire the camera-to-target extrinsic matrix, retrying with backoff.
///
/// Each attempt asks the provider for the transform with a bounded wait.
/// `cancel` is checked before every attempt so the caller can abort a
/// shutdown-blocking acquisition. The result is meant to be frozen by the
/// caller; nothing here is retried after the first success.
pub fn acquire_extrinsics(
    provider: &dyn TransformProvider,
    target_frame: &str,
    source_frame: &str,
    wait: Duration,
    retry: &RetryPolicy,
    cancel: &AtomicBool,
) -> Result<Matrix4<f64>, CalibrationError> {
    let attempts = retry.max_attempts.max(1);
    let mut backoff = retry.initial_backoff_s.max(0.0);
    let mut last_reason = String::new();

    for attempt in 1..=attempts {
        if cancel.load(Ordering::Relaxed) {
            return Err(CalibrationError::Cancelled);
        }

        match provider.lookup(target_frame, source_frame, wait) {
            Ok(transform) => {
                info!("extrinsic parameters captured ({target_frame} <- {source_frame})");
                return Ok(transform.to_homogeneous());
            }
            Err(err) => {
                warn!(
                    "could not transform {target_frame} <- {source_frame} \
                     (attempt {attempt}/{attempts}): {err}"
                );
                last_reason = err.0;
            }
        }

        if attempt < attempts && backoff > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(backoff));
            backoff = (backoff * 2.0).min(retry.max_backoff_s.max(0.0));
        }
    }

    Err(CalibrationError::Unavailable {
        target_frame: target_frame.to_owned(),
        source_frame: source_frame.to_owned(),
        attempts,
        reason: last_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector4;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn quaternion_rotation_and_translation_assemble() {
        // 90 degrees about +z, then translate by (1, 2, 3).
        let half = std::f64::consts::FRAC_1_SQRT_2;
        let t = RigidTransform::from_parts(Vector3::new(1.0, 2.0, 3.0), [half, 0.0, 0.0, half]);
        let h = t.to_homogeneous();

        let p = h * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 3.0, epsilon = 1e-12);
        assert_relative_eq!(p.z, 3.0, epsilon = 1e-12);
        assert_relative_eq!(p.w, 1.0, epsilon = 1e-12);

        assert_relative_eq!(h.row(3)[0], 0.0);
        assert_relative_eq!(h.row(3)[3], 1.0);
    }

    #[test]
    fn denormalised_quaternion_is_accepted() {
        let t = RigidTransform::from_parts(Vector3::zeros(), [2.0, 0.0, 0.0, 0.0]);
        let h = t.to_homogeneous();
        assert_relative_eq!(h, Matrix4::identity(), epsilon = 1e-12);
    }

    struct FlakyProvider {
        failures: u32,
        calls: AtomicU32,
    }

    impl TransformProvider for FlakyProvider {
        fn lookup(
            &self,
            _target: &str,
            _source: &str,
            _timeout: Duration,
        ) -> Result<RigidTransform, TransformLookupError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(TransformLookupError("not yet published".into()))
            } else {
                Ok(RigidTransform::identity())
            }
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff_s: 0.0,
            max_backoff_s: 0.0,
        }
    }

    #[test]
    fn retries_until_provider_succeeds() {
        let provider = FlakyProvider {
            failures: 3,
            calls: AtomicU32::new(0),
        };
        let cancel = AtomicBool::new(false);
        let h = acquire_extrinsics(
            &provider,
            "base_link",
            "camera",
            Duration::from_secs(5),
            &fast_retry(5),
            &cancel,
        )
        .expect("provider succeeds on fourth attempt");
        assert_relative_eq!(h, Matrix4::identity(), epsilon = 1e-12);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let provider = FlakyProvider {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        };
        let cancel = AtomicBool::new(false);
        let err = acquire_extrinsics(
            &provider,
            "base_link",
            "camera",
            Duration::from_millis(1),
            &fast_retry(3),
            &cancel,
        )
        .expect_err("provider never succeeds");
        assert!(matches!(
            err,
            CalibrationError::Unavailable { attempts: 3, .. }
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn unavailable_error_reports_frames_without_a_cause() {
        let err = CalibrationError::Unavailable {
            target_frame: "base_link".to_owned(),
            source_frame: "camera".to_owned(),
            attempts: 3,
            reason: "not yet published".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "transform base_link <- camera unavailable after 3 attempts: not yet published"
        );
        // The frame names are payload, not an error cause chain.
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn cancellation_stops_before_first_attempt() {
        let provider = FlakyProvider {
            failures: 0,
            calls: AtomicU32::new(0),
        };
        let cancel = AtomicBool::new(true);
        let err = acquire_extrinsics(
            &provider,
            "base_link",
            "camera",
            Duration::from_secs(5),
            &fast_retry(5),
            &cancel,
        )
        .expect_err("cancelled");
        assert!(matches!(err, CalibrationError::Cancelled));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
