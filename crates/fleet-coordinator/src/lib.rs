//! Fleet Coordinator Library
//!
//! Coordination core for the Partyline party-game server fleet. Every game
//! server process runs one coordinator; together they:
//!
//! - Elect at most one leader through a TTL lease in the shared store
//! - Fail over automatically when the leader crashes or is partitioned
//! - Run a periodic reconciliation sweep on the leader only, deleting orphaned
//!   voice-call meetings and abandoned game rooms
//!
//! # Architecture
//!
//! ```text
//! Coordinator (one per process)
//! ├── LeaseManager  ── fleet:leader (SET NX PX / Lua compare-and-expire)
//! └── Reconciler    ── only while leader
//!     ├── RoomStore        room:{id}, chat:{id}, room_code:{CODE}
//!     ├── MeetingRegistry  meeting:{room_id}, meeting_cleanup:{room_id}
//!     └── MeetingProvider  third-party call-hosting API
//! ```
//!
//! All shared state lives in the store behind the [`store::KvStore`] trait;
//! the only cross-process ordering primitive is its atomic conditional set.
//!
//! # Modules
//!
//! - [`config`] - Configuration from environment
//! - [`coordinator`] - `start` / `stop` / `status`
//! - [`errors`] - Error type
//! - [`lease`] - Leadership lease
//! - [`meetings`] - Meeting provider client and mapping registry
//! - [`observability`] - Health endpoints and metrics
//! - [`reconciler`] - Cleanup sweep
//! - [`rooms`] - Room records
//! - [`store`] - Shared key-value store

pub mod config;
pub mod coordinator;
pub mod errors;
pub mod lease;
pub mod meetings;
pub mod observability;
pub mod reconciler;
pub mod rooms;
pub mod store;
