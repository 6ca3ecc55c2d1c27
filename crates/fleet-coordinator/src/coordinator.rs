//! Per-process coordinator.
//!
//! Owns the heartbeat task. The heartbeat drives the [`LeaseManager`]; when
//! leadership is gained it spawns the [`Reconciler`] schedule under a child
//! cancellation token, and cancels that token when leadership is lost.
//!
//! ```text
//! Coordinator
//!   └── heartbeat task (parent token)
//!         └── reconciliation schedule (child token, only while leader)
//! ```
//!
//! Nothing here is global: each process builds one `Coordinator` and drives it
//! through `start()`, `stop()` and `status()`.

use crate::lease::{LeaseManager, LeaseTransition};
use crate::observability::StatusSource;
use crate::reconciler::Reconciler;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default heartbeat interval (1 second).
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Default bound on each shutdown step (5 seconds).
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Coordinator settings.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Time between lease heartbeats. Must be shorter than the lease TTL.
    pub heartbeat_interval: Duration,
    /// Upper bound for waiting on tasks, and separately on lease release, in `stop()`.
    pub shutdown_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Snapshot served on `/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoordinatorStatus {
    pub server_id: String,
    pub is_leader: bool,
}

/// A spawned task and the token that stops it.
struct Running {
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

/// Ties the lease to the reconciliation schedule for one process.
pub struct Coordinator {
    lease: Arc<LeaseManager>,
    reconciler: Arc<Reconciler>,
    config: CoordinatorConfig,
    running: Mutex<Option<Running>>,
}

impl Coordinator {
    pub fn new(lease: LeaseManager, reconciler: Reconciler, config: CoordinatorConfig) -> Self {
        Self {
            lease: Arc::new(lease),
            reconciler: Arc::new(reconciler),
            config,
            running: Mutex::new(None),
        }
    }

    /// The lease manager driven by this coordinator.
    #[must_use]
    pub fn lease(&self) -> &Arc<LeaseManager> {
        &self.lease
    }

    /// Whether the heartbeat task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .map(|running| running.is_some())
            .unwrap_or(false)
    }

    /// Spawn the heartbeat task. A second call while running is a no-op.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let Ok(mut running) = self.running.lock() else {
            warn!(target: "fc.coordinator", "Coordinator state poisoned, not starting");
            return;
        };

        if running.is_some() {
            debug!(target: "fc.coordinator", "Coordinator already running");
            return;
        }

        let cancel_token = CancellationToken::new();
        let heartbeat = tokio::spawn(heartbeat_loop(
            Arc::clone(&self.lease),
            Arc::clone(&self.reconciler),
            self.config.heartbeat_interval,
            cancel_token.clone(),
        ));

        *running = Some(Running {
            cancel_token,
            task: heartbeat,
        });

        info!(
            target: "fc.coordinator",
            server_id = %self.lease.server_id(),
            heartbeat_interval_ms = self.config.heartbeat_interval.as_millis(),
            "Coordinator started"
        );
    }

    /// Stop the heartbeat and reconciliation tasks, then release the lease.
    ///
    /// Each of the two steps is bounded by `shutdown_timeout`. Timeouts are
    /// logged and ignored; an unreleased lease expires on its own. Calling
    /// `stop()` on a stopped coordinator is a no-op.
    #[instrument(skip_all, fields(server_id = %self.lease.server_id()))]
    pub async fn stop(&self) {
        let running = match self.running.lock() {
            Ok(mut running) => running.take(),
            Err(_) => None,
        };

        let Some(Running {
            cancel_token,
            task: mut heartbeat,
        }) = running
        else {
            return;
        };

        info!(target: "fc.coordinator", "Stopping coordinator");
        cancel_token.cancel();

        match tokio::time::timeout(self.config.shutdown_timeout, &mut heartbeat).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(target: "fc.coordinator", error = %e, "Heartbeat task failed");
            }
            Err(_) => {
                warn!(
                    target: "fc.coordinator",
                    timeout_ms = self.config.shutdown_timeout.as_millis(),
                    "Heartbeat task did not stop in time, aborting"
                );
                heartbeat.abort();
            }
        }

        match tokio::time::timeout(self.config.shutdown_timeout, self.lease.step_down()).await {
            Ok(true) => info!(target: "fc.coordinator", "Released leadership on shutdown"),
            Ok(false) => {}
            Err(_) => warn!(
                target: "fc.coordinator",
                "Lease release timed out, lease will expire on its own"
            ),
        }

        info!(target: "fc.coordinator", "Coordinator stopped");
    }

    #[must_use]
    pub fn status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            server_id: self.lease.server_id().to_string(),
            is_leader: self.lease.is_leader(),
        }
    }
}

impl StatusSource for Coordinator {
    fn status(&self) -> CoordinatorStatus {
        Coordinator::status(self)
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if let Ok(Some(running)) = self.running.get_mut() {
            running.cancel_token.cancel();
        }
    }
}

/// Heartbeat on every tick; start or stop the reconciliation schedule on
/// leadership changes.
#[instrument(skip_all, name = "fc.coordinator.heartbeat")]
async fn heartbeat_loop(
    lease: Arc<LeaseManager>,
    reconciler: Arc<Reconciler>,
    heartbeat_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut interval = tokio::time::interval(heartbeat_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut schedule: Option<Running> = None;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match lease.heartbeat().await {
                    LeaseTransition::Acquired => {
                        if let Some(previous) = schedule.take() {
                            previous.cancel_token.cancel();
                        }
                        let child = cancel_token.child_token();
                        let handle = tokio::spawn(
                            Arc::clone(&reconciler).run(Arc::clone(&lease), child.clone()),
                        );
                        schedule = Some(Running {
                            cancel_token: child,
                            task: handle,
                        });
                    }
                    LeaseTransition::Lost => {
                        if let Some(previous) = schedule.take() {
                            previous.cancel_token.cancel();
                            info!(target: "fc.coordinator", "Leadership lost, reconciliation stopped");
                        }
                    }
                    LeaseTransition::Renewed | LeaseTransition::Follower => {}
                }
            }
            () = cancel_token.cancelled() => {
                break;
            }
        }
    }

    if let Some(current) = schedule.take() {
        current.cancel_token.cancel();
        if let Err(e) = current.task.await {
            warn!(target: "fc.coordinator", error = %e, "Reconciliation task failed");
        }
    }

    debug!(target: "fc.coordinator", "Heartbeat task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.heartbeat_interval, Duration::from_secs(1));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_status_serializes() {
        let status = CoordinatorStatus {
            server_id: "fc-a".to_string(),
            is_leader: true,
        };
        let json = serde_json::to_value(&status).unwrap_or_default();
        assert_eq!(json, serde_json::json!({"server_id": "fc-a", "is_leader": true}));
    }
}
