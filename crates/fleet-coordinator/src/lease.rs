//! Fleet-wide leadership lease.
//!
//! One key in the shared store (`fleet:leader` by default) names the process
//! allowed to run the reconciler. The key carries an expiry, so a crashed or
//! partitioned holder loses the lease within one TTL without any cooperation.
//!
//! # State Machine
//!
//! ```text
//!            try_acquire ok
//!  Follower ----------------> Leader
//!     ^                         |
//!     +---- renew fails --------+
//!     +---- step_down ----------+
//! ```
//!
//! # Local Deadline
//!
//! Besides the flag, the manager remembers when its last successful
//! acquire/renew *started* plus the TTL. `is_leader()` is false once that
//! deadline passes, even if no heartbeat has run since. The store-side key
//! can only expire later than this deadline, so a stalled holder stops
//! believing it leads no later than a successor can acquire.
//!
//! Store errors are never propagated: they count as a failed acquire or renew.
//! Every lease store call is bounded by half the TTL; a call that does not
//! answer in time is treated as a store error.

use crate::errors::FcError;
use crate::observability::metrics;
use crate::store::KvStore;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Lease settings.
#[derive(Debug, Clone)]
pub struct LeaseConfig {
    /// Leadership key.
    pub key: String,
    /// Expiry written on acquire and on every renewal.
    pub ttl: Duration,
}

/// Outcome of one heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseTransition {
    /// Was follower, now leader.
    Acquired,
    /// Was leader, still leader.
    Renewed,
    /// Was leader, now follower.
    Lost,
    /// Was follower, still follower.
    Follower,
}

impl LeaseTransition {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaseTransition::Acquired => "acquired",
            LeaseTransition::Renewed => "renewed",
            LeaseTransition::Lost => "lost",
            LeaseTransition::Follower => "follower",
        }
    }
}

/// Acquires, renews and releases the leadership lease for one process.
pub struct LeaseManager {
    store: Arc<dyn KvStore>,
    server_id: String,
    config: LeaseConfig,
    leader: AtomicBool,
    deadline: Mutex<Option<Instant>>,
}

impl LeaseManager {
    pub fn new(store: Arc<dyn KvStore>, server_id: impl Into<String>, config: LeaseConfig) -> Self {
        Self {
            store,
            server_id: server_id.into(),
            config,
            leader: AtomicBool::new(false),
            deadline: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    #[must_use]
    pub fn config(&self) -> &LeaseConfig {
        &self.config
    }

    /// Whether this process currently holds a lease that has not locally expired.
    #[must_use]
    pub fn is_leader(&self) -> bool {
        if !self.leader.load(Ordering::SeqCst) {
            return false;
        }
        if self.deadline_valid(Instant::now()) {
            return true;
        }
        // Lapsed before a heartbeat noticed; stop exporting leadership now.
        metrics::set_leader(false);
        false
    }

    /// Bound on a single lease store call.
    fn store_timeout(&self) -> Duration {
        self.config.ttl / 2
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, FcError>>,
    ) -> Result<T, FcError> {
        let limit = self.store_timeout();
        tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
            Err(FcError::Redis(format!(
                "{operation} timed out after {}ms",
                limit.as_millis()
            )))
        })
    }

    fn deadline_valid(&self, now: Instant) -> bool {
        self.deadline
            .lock()
            .map(|d| d.is_some_and(|deadline| now < deadline))
            .unwrap_or(false)
    }

    fn mark_leader(&self, started: Instant) {
        if let Ok(mut deadline) = self.deadline.lock() {
            *deadline = Some(started + self.config.ttl);
        }
        self.leader.store(true, Ordering::SeqCst);
        metrics::set_leader(true);
    }

    fn mark_follower(&self) {
        self.leader.store(false, Ordering::SeqCst);
        if let Ok(mut deadline) = self.deadline.lock() {
            *deadline = None;
        }
        metrics::set_leader(false);
    }

    /// Try to become leader with `SET key server_id NX PX ttl`.
    ///
    /// Succeeds only if the key was absent. No side effects on failure, unless
    /// a timed-out write landed anyway; the record then expires unrenewed.
    #[instrument(skip_all, fields(server_id = %self.server_id))]
    pub async fn try_acquire(&self) -> bool {
        let started = Instant::now();

        match self
            .bounded(
                "set_if_absent",
                self.store
                    .set_if_absent(&self.config.key, &self.server_id, self.config.ttl),
            )
            .await
        {
            Ok(true) => {
                self.mark_leader(started);
                info!(
                    target: "fc.lease",
                    server_id = %self.server_id,
                    ttl_ms = self.config.ttl.as_millis(),
                    "Acquired leadership lease"
                );
                true
            }
            Ok(false) => {
                debug!(target: "fc.lease", "Lease held by another process");
                false
            }
            Err(e) => {
                warn!(
                    target: "fc.lease",
                    error = %e,
                    "Lease acquisition failed, remaining follower"
                );
                false
            }
        }
    }

    /// Extend the lease if the record still names this process.
    ///
    /// Leader-only: returns `false` without touching the store when called by
    /// a follower. Any failure (held by someone else, key gone, store error or
    /// timeout) demotes this process to follower.
    #[instrument(skip_all, fields(server_id = %self.server_id))]
    pub async fn renew(&self) -> bool {
        if !self.leader.load(Ordering::SeqCst) {
            return false;
        }

        let started = Instant::now();

        match self
            .bounded(
                "expire_if_equals",
                self.store
                    .expire_if_equals(&self.config.key, &self.server_id, self.config.ttl),
            )
            .await
        {
            Ok(true) => {
                self.mark_leader(started);
                debug!(target: "fc.lease", "Renewed leadership lease");
                true
            }
            Ok(false) => {
                self.mark_follower();
                warn!(
                    target: "fc.lease",
                    server_id = %self.server_id,
                    "Leadership lease lost: record expired or held by another process"
                );
                false
            }
            Err(e) => {
                self.mark_follower();
                warn!(
                    target: "fc.lease",
                    error = %e,
                    "Lease renewal failed, stepping down"
                );
                false
            }
        }
    }

    /// One heartbeat tick: renew when leading, otherwise try to acquire.
    pub async fn heartbeat(&self) -> LeaseTransition {
        let transition = if self.leader.load(Ordering::SeqCst) {
            if !self.deadline_valid(Instant::now()) {
                // Stalled past our own deadline; a successor may already hold
                // the key, so do not extend anything.
                self.mark_follower();
                warn!(
                    target: "fc.lease",
                    server_id = %self.server_id,
                    "Leadership lease expired locally before renewal"
                );
                LeaseTransition::Lost
            } else if self.renew().await {
                LeaseTransition::Renewed
            } else {
                LeaseTransition::Lost
            }
        } else if self.try_acquire().await {
            LeaseTransition::Acquired
        } else {
            LeaseTransition::Follower
        };

        metrics::record_lease_transition(transition.as_str());
        transition
    }

    /// Give up leadership. Idempotent.
    ///
    /// The record is deleted only if it still names this process, so a lease
    /// already taken over by a successor is left alone. Store errors are
    /// logged and ignored; the key then expires on its own.
    ///
    /// Returns whether this process was leader before the call.
    #[instrument(skip_all, fields(server_id = %self.server_id))]
    pub async fn step_down(&self) -> bool {
        let was_leader = self.leader.load(Ordering::SeqCst);
        if !was_leader {
            return false;
        }
        self.mark_follower();

        match self
            .bounded(
                "delete_if_equals",
                self.store.delete_if_equals(&self.config.key, &self.server_id),
            )
            .await
        {
            Ok(true) => {
                info!(target: "fc.lease", server_id = %self.server_id, "Released leadership lease");
            }
            Ok(false) => {
                info!(
                    target: "fc.lease",
                    server_id = %self.server_id,
                    "Stepped down; lease already expired or taken over"
                );
            }
            Err(e) => {
                warn!(
                    target: "fc.lease",
                    error = %e,
                    "Failed to release leadership lease, it will expire on its own"
                );
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_labels() {
        assert_eq!(LeaseTransition::Acquired.as_str(), "acquired");
        assert_eq!(LeaseTransition::Renewed.as_str(), "renewed");
        assert_eq!(LeaseTransition::Lost.as_str(), "lost");
        assert_eq!(LeaseTransition::Follower.as_str(), "follower");
    }
}
