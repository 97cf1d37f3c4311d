//! Health Policy
//!
//! Maps a node's observed error rate to its health flag.

use crate::domain::entities::HealthStatus;

/// Error rate above which a node is considered unhealthy.
pub const DEFAULT_ERROR_RATE_THRESHOLD: f64 = 0.5;

/// Level-triggered health evaluation.
///
/// The result depends only on the current sample: there is no hysteresis,
/// so a node hovering around the threshold can change state on every check.
pub fn evaluate(error_rate: f64, threshold: f64) -> HealthStatus {
    if error_rate > threshold {
        HealthStatus::Unhealthy
    } else {
        HealthStatus::Healthy
    }
}
