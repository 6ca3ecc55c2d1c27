//! # FC Test Utilities
//!
//! Shared test utilities for the Fleet Coordinator.
//!
//! Mocks and fixtures for running the lease manager, reconciler and
//! coordinator without Redis or a real meeting provider.
//!
//! ## Modules
//!
//! - `mock_kv` - In-memory `KvStore` with TTLs on tokio time and fault injection
//! - `mock_provider` - Recording `MeetingProvider` with configurable failures
//! - `fixtures` - Room builder and store seeding helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fc_test_utils::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_example() {
//!     let kv = MemoryKv::new();
//!     let provider = MockMeetingProvider::new();
//!
//!     RoomBuilder::new("room-1")
//!         .host("alice", false)
//!         .player("bob", true)
//!         .seed(&kv);
//!     seed_meeting(&kv, "room-1", "mtg-1");
//!
//!     // Build a Reconciler over Arc::new(kv.clone()) and sweep...
//! }
//! ```
//!
//! `MemoryKv` expiries use `tokio::time::Instant`, so tests running with
//! `start_paused = true` control lease expiry through `tokio::time::advance`.

pub mod fixtures;
pub mod mock_kv;
pub mod mock_provider;

pub use fixtures::*;
pub use mock_kv::*;
pub use mock_provider::*;
