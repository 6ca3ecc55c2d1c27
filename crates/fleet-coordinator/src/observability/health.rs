//! Health endpoints for the Fleet Coordinator.
//!
//! - `GET /health` - Liveness probe (is the process running?)
//! - `GET /ready` - Readiness probe (is the coordinator running?)
//! - `GET /status` - `{ "server_id", "is_leader" }` for fleet dashboards
//!
//! The `/metrics` endpoint is served separately via `metrics-exporter-prometheus`.

use crate::coordinator::CoordinatorStatus;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Anything that can report coordinator status.
pub trait StatusSource: Send + Sync {
    fn status(&self) -> CoordinatorStatus;
}

/// Health state for the Fleet Coordinator.
#[derive(Debug)]
pub struct HealthState {
    /// Always true after startup initialization.
    live: AtomicBool,
    /// True while the coordinator's heartbeat task is running.
    ready: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (live=true, ready=false).
    #[must_use]
    pub fn new() -> Self {
        Self {
            live: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        }
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct HealthContext {
    health: Arc<HealthState>,
    status: Arc<dyn StatusSource>,
}

/// Create the health router.
///
/// # Endpoints
///
/// - `GET /health` - 200 if the process is running
/// - `GET /ready` - 200 once the coordinator is started, 503 otherwise
/// - `GET /status` - JSON coordinator status (always 200)
pub fn health_router(health_state: Arc<HealthState>, status: Arc<dyn StatusSource>) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .route("/status", get(status_handler))
        .with_state(HealthContext {
            health: health_state,
            status,
        })
}

async fn liveness_handler(State(ctx): State<HealthContext>) -> StatusCode {
    if ctx.health.is_live() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn readiness_handler(State(ctx): State<HealthContext>) -> StatusCode {
    if ctx.health.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn status_handler(State(ctx): State<HealthContext>) -> Json<CoordinatorStatus> {
    Json(ctx.status.status())
}
