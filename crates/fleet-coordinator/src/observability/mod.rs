//! Observability module for the Fleet Coordinator.
//!
//! All instrumentation uses `#[instrument(skip_all)]` with explicit safe
//! fields. Secrets (store URL, provider API key) never appear in spans,
//! logs or metric labels.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `fc_is_leader` | Gauge | none | 1 while this process holds the lease |
//! | `fc_lease_transitions_total` | Counter | `transition` | Heartbeat outcomes |
//! | `fc_sweeps_total` | Counter | `status` | Reconciliation sweeps |
//! | `fc_sweep_duration_seconds` | Histogram | `status` | Sweep latency |
//! | `fc_cleanup_total` | Counter | `resource`, `outcome` | Meetings and rooms cleaned up |
//! | `fc_redis_latency_seconds` | Histogram | `operation` | Store latency |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState, StatusSource};
pub use metrics::init_metrics_recorder;
