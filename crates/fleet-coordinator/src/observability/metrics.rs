//! Metrics definitions for the Fleet Coordinator.
//!
//! All metrics follow Prometheus naming conventions:
//! - `fc_` prefix for Fleet Coordinator
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `transition`: 4 values (acquired, renewed, lost, follower)
//! - `status`: 2 values (ok, partial)
//! - `resource`: 2 values (meeting, room)
//! - `outcome`: bounded by cleanup outcomes (deleted, retained, abandoned)
//! - `operation`: bounded by Redis commands (~8 values)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Redis latency buckets - internal service call
        .set_buckets_for_metric(
            Matcher::Prefix("fc_redis".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set Redis latency buckets: {e}"))?
        // Sweep duration buckets - scans plus provider calls
        .set_buckets_for_metric(
            Matcher::Prefix("fc_sweep".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set sweep duration buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

/// Set whether this process currently holds the lease.
///
/// Metric: `fc_is_leader`
/// Labels: none
///
/// Summed across the fleet this should never exceed 1.
pub fn set_leader(is_leader: bool) {
    gauge!("fc_is_leader").set(if is_leader { 1.0 } else { 0.0 });
}

/// Record the outcome of one heartbeat.
///
/// Metric: `fc_lease_transitions_total`
/// Labels: `transition`
pub fn record_lease_transition(transition: &str) {
    counter!("fc_lease_transitions_total", "transition" => transition.to_string()).increment(1);
}

/// Record one reconciliation sweep.
///
/// Metrics: `fc_sweeps_total`, `fc_sweep_duration_seconds`
/// Labels: `status` (ok, partial)
pub fn record_sweep(status: &str, duration: Duration) {
    counter!("fc_sweeps_total", "status" => status.to_string()).increment(1);
    histogram!("fc_sweep_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());
}

/// Record a cleanup action.
///
/// Metric: `fc_cleanup_total`
/// Labels: `resource`, `outcome`
///
/// `meeting/abandoned` means a provider meeting may have leaked; alert on it.
pub fn record_cleanup(resource: &str, outcome: &str) {
    counter!(
        "fc_cleanup_total",
        "resource" => resource.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record Redis operation latency.
///
/// Metric: `fc_redis_latency_seconds`
/// Labels: `operation`
pub fn record_redis_latency(operation: &str, duration: Duration) {
    histogram!("fc_redis_latency_seconds", "operation" => operation.to_string())
        .record(duration.as_secs_f64());
}
