//! Reconciliation sweep, run only by the lease holder.
//!
//! Each sweep has two passes:
//!
//! 1. **Meeting pass** - every `meeting:{room_id}` mapping whose room is gone
//!    or back in the lobby gets its external meeting deleted.
//! 2. **Room pass** - every abandoned room (host disconnected, or nobody
//!    connected) has its meeting cleaned up, then its record, chat history
//!    and join-code index deleted.
//!
//! # Failed External Deletes
//!
//! A mapping is removed once the provider confirms deletion. When the
//! provider call fails, the failure is counted under
//! `meeting_cleanup:{room_id}` and the mapping is kept for the next sweep.
//! After `max_meeting_delete_attempts` failures the mapping is dropped anyway;
//! that is logged at `error` and counted as `meeting/abandoned` because the
//! external meeting may have leaked.
//!
//! # Error Handling
//!
//! Per-item failures are logged, counted in the [`SweepReport`], and the sweep
//! moves on. A failed scan aborts only its own pass. Nothing propagates out
//! of [`Reconciler::run`]; a panicking sweep is reported and the next tick
//! runs normally.
//!
//! # Leadership
//!
//! [`Reconciler::run`] checks [`LeaseManager::is_leader`] before every sweep
//! and skips the tick when it is false. The coordinator cancels the schedule
//! on `Lost`, but a heartbeat stuck in a slow store call would report that
//! late; the local deadline does not wait for it.

use crate::lease::LeaseManager;
use crate::meetings::{MeetingProvider, MeetingRegistry};
use crate::observability::metrics;
use crate::rooms::{RoomState, RoomStore};
use crate::store::{keys, scan_prefix, KvStore};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default sweep interval (1 second).
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Default SCAN COUNT hint.
const DEFAULT_SCAN_BATCH_SIZE: usize = 100;

/// Default number of failed external deletes before a mapping is dropped.
const DEFAULT_MAX_MEETING_DELETE_ATTEMPTS: u32 = 5;

/// Default TTL of the failed-delete counter (1 hour).
const DEFAULT_CLEANUP_ATTEMPTS_TTL: Duration = Duration::from_secs(3600);

/// Reconciler settings.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Time between sweeps.
    pub sweep_interval: Duration,
    /// SCAN COUNT hint for both passes.
    pub scan_batch_size: usize,
    /// Failed external deletes tolerated before the mapping is dropped.
    pub max_meeting_delete_attempts: u32,
    /// Expiry of the failed-delete counter.
    pub cleanup_attempts_ttl: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
            max_meeting_delete_attempts: DEFAULT_MAX_MEETING_DELETE_ATTEMPTS,
            cleanup_attempts_ttl: DEFAULT_CLEANUP_ATTEMPTS_TTL,
        }
    }
}

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Meeting mappings examined in the meeting pass.
    pub meetings_scanned: usize,
    /// Meetings deleted externally and unmapped.
    pub meetings_deleted: usize,
    /// Mappings kept after a failed external delete.
    pub meetings_retained: usize,
    /// Mappings dropped after exhausting delete attempts.
    pub meetings_abandoned: usize,
    /// Room records examined in the room pass.
    pub rooms_scanned: usize,
    /// Abandoned rooms deleted.
    pub rooms_deleted: usize,
    /// Store, scan or decode failures.
    pub errors: usize,
}

impl SweepReport {
    /// True if nothing failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }

    fn status(&self) -> &'static str {
        if self.is_clean() {
            "ok"
        } else {
            "partial"
        }
    }

    fn tally(&mut self, outcome: MeetingCleanup) {
        match outcome {
            MeetingCleanup::NoMapping => {}
            MeetingCleanup::Deleted => self.meetings_deleted += 1,
            MeetingCleanup::Retained => self.meetings_retained += 1,
            MeetingCleanup::Abandoned => self.meetings_abandoned += 1,
            MeetingCleanup::Failed => self.errors += 1,
        }
    }
}

/// Result of cleaning up one room's meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MeetingCleanup {
    /// No mapping exists for the room.
    NoMapping,
    /// External meeting deleted and mapping removed.
    Deleted,
    /// External delete failed; mapping kept for retry.
    Retained,
    /// External delete failed too often; mapping dropped.
    Abandoned,
    /// Store error; state unknown.
    Failed,
}

/// Periodic janitor for meetings and rooms.
pub struct Reconciler {
    store: Arc<dyn KvStore>,
    rooms: RoomStore,
    meetings: MeetingRegistry,
    provider: Arc<dyn MeetingProvider>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn KvStore>,
        provider: Arc<dyn MeetingProvider>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            rooms: RoomStore::new(Arc::clone(&store)),
            meetings: MeetingRegistry::new(Arc::clone(&store)),
            store,
            provider,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Sweep on every tick until `cancel_token` is cancelled.
    ///
    /// The first sweep runs immediately. Ticks missed while a slow sweep runs
    /// are skipped, never queued, and so are ticks on which `lease` does not
    /// report leadership. Each sweep runs in its own task so a panic is
    /// contained; cancellation aborts an in-flight sweep.
    #[instrument(skip_all, name = "fc.reconciler")]
    pub async fn run(self: Arc<Self>, lease: Arc<LeaseManager>, cancel_token: CancellationToken) {
        info!(
            target: "fc.reconciler",
            sweep_interval_ms = self.config.sweep_interval.as_millis(),
            "Starting reconciliation schedule"
        );

        let mut interval = tokio::time::interval(self.config.sweep_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if !lease.is_leader() {
                        debug!(
                            target: "fc.reconciler",
                            server_id = %lease.server_id(),
                            "Not leader, skipping sweep"
                        );
                        continue;
                    }

                    let reconciler = Arc::clone(&self);
                    let mut sweep = tokio::spawn(async move { reconciler.sweep().await });

                    tokio::select! {
                        result = &mut sweep => {
                            if let Err(e) = result {
                                error!(
                                    target: "fc.reconciler",
                                    error = %e,
                                    "Sweep task failed, continuing with next tick"
                                );
                            }
                        }
                        () = cancel_token.cancelled() => {
                            sweep.abort();
                            break;
                        }
                    }
                }
                () = cancel_token.cancelled() => {
                    break;
                }
            }
        }

        info!(target: "fc.reconciler", "Reconciliation schedule stopped");
    }

    /// Run one sweep: meeting pass, then room pass.
    pub async fn sweep(&self) -> SweepReport {
        let start = Instant::now();
        let mut report = SweepReport::default();
        let mut attempted = HashSet::new();

        self.meeting_pass(&mut report, &mut attempted).await;
        self.room_pass(&mut report, &attempted).await;

        let duration = start.elapsed();
        metrics::record_sweep(report.status(), duration);

        if report.meetings_deleted
            + report.meetings_retained
            + report.meetings_abandoned
            + report.rooms_deleted
            + report.errors
            > 0
        {
            info!(
                target: "fc.reconciler",
                meetings_deleted = report.meetings_deleted,
                meetings_retained = report.meetings_retained,
                meetings_abandoned = report.meetings_abandoned,
                rooms_deleted = report.rooms_deleted,
                errors = report.errors,
                duration_ms = duration.as_millis(),
                "Sweep completed"
            );
        } else {
            debug!(
                target: "fc.reconciler",
                meetings_scanned = report.meetings_scanned,
                rooms_scanned = report.rooms_scanned,
                "Sweep completed, nothing to clean"
            );
        }

        report
    }

    async fn meeting_pass(&self, report: &mut SweepReport, attempted: &mut HashSet<String>) {
        let meeting_keys =
            match scan_prefix(&*self.store, keys::MEETING_PREFIX, self.config.scan_batch_size)
                .await
            {
                Ok(found) => found,
                Err(e) => {
                    error!(target: "fc.reconciler", error = %e, "Meeting scan failed");
                    report.errors += 1;
                    return;
                }
            };

        for key in meeting_keys {
            let Some(room_id) = keys::room_id_from_meeting_key(&key) else {
                continue;
            };
            report.meetings_scanned += 1;

            let stale = match self.rooms.get_room(room_id).await {
                Ok(None) => true,
                Ok(Some(room)) => room.state == RoomState::Lobby,
                Err(e) => {
                    warn!(
                        target: "fc.reconciler",
                        error = %e,
                        error_type = e.error_type(),
                        room_id = %room_id,
                        "Failed to load room for meeting mapping"
                    );
                    report.errors += 1;
                    continue;
                }
            };

            if stale {
                attempted.insert(room_id.to_string());
                let outcome = self.cleanup_meeting(room_id).await;
                report.tally(outcome);
            }
        }
    }

    async fn room_pass(&self, report: &mut SweepReport, attempted: &HashSet<String>) {
        let room_keys =
            match scan_prefix(&*self.store, keys::ROOM_PREFIX, self.config.scan_batch_size).await {
                Ok(found) => found,
                Err(e) => {
                    error!(target: "fc.reconciler", error = %e, "Room scan failed");
                    report.errors += 1;
                    return;
                }
            };

        for key in room_keys {
            let Some(room_id) = keys::room_id_from_room_key(&key) else {
                continue;
            };
            report.rooms_scanned += 1;

            let room = match self.rooms.get_room(room_id).await {
                Ok(Some(room)) => room,
                // Deleted between scan and read.
                Ok(None) => continue,
                Err(e) => {
                    warn!(
                        target: "fc.reconciler",
                        error = %e,
                        error_type = e.error_type(),
                        room_id = %room_id,
                        "Failed to load room"
                    );
                    report.errors += 1;
                    continue;
                }
            };

            if !room.is_abandoned() {
                continue;
            }

            debug!(
                target: "fc.reconciler",
                room_id = %room_id,
                host_connected = room.is_host_connected(),
                connected_players = room.connected_player_count(),
                "Room abandoned"
            );

            // At most one external delete per room per sweep.
            if !attempted.contains(room_id) {
                let outcome = self.cleanup_meeting(room_id).await;
                report.tally(outcome);
            }

            let code = (!room.code.is_empty()).then_some(room.code.as_str());
            match self.rooms.delete_room(room_id, code).await {
                Ok(()) => {
                    report.rooms_deleted += 1;
                    metrics::record_cleanup("room", "deleted");
                    info!(target: "fc.reconciler", room_id = %room_id, "Deleted abandoned room");
                }
                Err(e) => {
                    warn!(
                        target: "fc.reconciler",
                        error = %e,
                        room_id = %room_id,
                        "Failed to delete abandoned room"
                    );
                    report.errors += 1;
                }
            }
        }
    }

    /// Delete the external meeting of a room, then its mapping.
    async fn cleanup_meeting(&self, room_id: &str) -> MeetingCleanup {
        let meeting_id = match self.meetings.get(room_id).await {
            Ok(Some(id)) => id,
            Ok(None) => return MeetingCleanup::NoMapping,
            Err(e) => {
                warn!(
                    target: "fc.reconciler",
                    error = %e,
                    room_id = %room_id,
                    "Failed to read meeting mapping"
                );
                return MeetingCleanup::Failed;
            }
        };

        if self.provider.delete_meeting(&meeting_id).await {
            return match self.meetings.delete(room_id).await {
                Ok(()) => {
                    metrics::record_cleanup("meeting", "deleted");
                    info!(
                        target: "fc.reconciler",
                        room_id = %room_id,
                        meeting_id = %meeting_id,
                        "Deleted meeting"
                    );
                    MeetingCleanup::Deleted
                }
                Err(e) => {
                    // External meeting is gone; the next sweep's delete is a no-op.
                    warn!(
                        target: "fc.reconciler",
                        error = %e,
                        room_id = %room_id,
                        "Failed to remove meeting mapping"
                    );
                    MeetingCleanup::Failed
                }
            };
        }

        let attempts = match self
            .meetings
            .record_failed_delete(room_id, self.config.cleanup_attempts_ttl)
            .await
        {
            Ok(attempts) => attempts,
            Err(e) => {
                warn!(
                    target: "fc.reconciler",
                    error = %e,
                    room_id = %room_id,
                    "Failed to record meeting delete failure"
                );
                return MeetingCleanup::Failed;
            }
        };

        if attempts < self.config.max_meeting_delete_attempts {
            metrics::record_cleanup("meeting", "retained");
            warn!(
                target: "fc.reconciler",
                room_id = %room_id,
                meeting_id = %meeting_id,
                attempts,
                max_attempts = self.config.max_meeting_delete_attempts,
                "External meeting delete failed, will retry"
            );
            return MeetingCleanup::Retained;
        }

        match self.meetings.delete(room_id).await {
            Ok(()) => {
                metrics::record_cleanup("meeting", "abandoned");
                error!(
                    target: "fc.reconciler",
                    room_id = %room_id,
                    meeting_id = %meeting_id,
                    attempts,
                    "Giving up on external meeting delete, meeting may have leaked"
                );
                MeetingCleanup::Abandoned
            }
            Err(e) => {
                warn!(
                    target: "fc.reconciler",
                    error = %e,
                    room_id = %room_id,
                    "Failed to drop meeting mapping"
                );
                MeetingCleanup::Failed
            }
        }
    }
}
