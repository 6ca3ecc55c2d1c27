//! Tests for the coordinator lifecycle.
//!
//! Uses tokio's paused clock; `sleep` in the test lets the heartbeat and
//! reconciliation tasks run up to the given virtual time.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use fc_test_utils::{seed_meeting, MemoryKv, MockMeetingProvider};
use fleet_coordinator::coordinator::{Coordinator, CoordinatorConfig, CoordinatorStatus};
use fleet_coordinator::lease::{LeaseConfig, LeaseManager};
use fleet_coordinator::meetings::MeetingProvider;
use fleet_coordinator::reconciler::{Reconciler, ReconcilerConfig};
use fleet_coordinator::store::KvStore;

const LEASE_KEY: &str = "fleet:leader";

fn coordinator(kv: &MemoryKv, provider: &MockMeetingProvider, server_id: &str) -> Coordinator {
    let store: Arc<dyn KvStore> = Arc::new(kv.clone());
    let provider: Arc<dyn MeetingProvider> = Arc::new(provider.clone());

    let lease = LeaseManager::new(
        Arc::clone(&store),
        server_id,
        LeaseConfig {
            key: LEASE_KEY.to_string(),
            ttl: Duration::from_secs(3),
        },
    );
    let reconciler = Reconciler::new(store, provider, ReconcilerConfig::default());

    Coordinator::new(
        lease,
        reconciler,
        CoordinatorConfig {
            heartbeat_interval: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(5),
        },
    )
}

#[tokio::test(start_paused = true)]
async fn test_start_acquires_and_reconciles() {
    let kv = MemoryKv::new();
    let provider = MockMeetingProvider::new();
    seed_meeting(&kv, "gone", "mtg-1");

    let a = coordinator(&kv, &provider, "fc-a");
    a.start();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(a.is_running());
    assert_eq!(
        a.status(),
        CoordinatorStatus {
            server_id: "fc-a".to_string(),
            is_leader: true,
        }
    );
    assert!(!kv.contains_key("meeting:gone"), "Leader sweeps immediately");
    assert_eq!(provider.delete_calls(), vec!["mtg-1"]);

    a.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_releases_lease() {
    let kv = MemoryKv::new();
    let provider = MockMeetingProvider::new();

    let a = coordinator(&kv, &provider, "fc-a");
    a.start();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(kv.value(LEASE_KEY).as_deref(), Some("fc-a"));

    a.stop().await;

    assert!(!a.is_running());
    assert!(!a.status().is_leader);
    assert!(!kv.contains_key(LEASE_KEY));
}

#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent_and_stop_without_start_is_noop() {
    let kv = MemoryKv::new();
    let provider = MockMeetingProvider::new();

    let a = coordinator(&kv, &provider, "fc-a");
    a.stop().await;
    assert!(!a.is_running());

    a.start();
    a.start();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(kv.call_count("set_if_absent"), 1, "Only one heartbeat task");

    a.stop().await;
    a.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_only_one_coordinator_leads() {
    let kv = MemoryKv::new();
    let provider = MockMeetingProvider::new();

    let a = coordinator(&kv, &provider, "fc-a");
    let b = coordinator(&kv, &provider, "fc-b");
    a.start();
    b.start();

    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let leaders = [a.status(), b.status()]
            .iter()
            .filter(|s| s.is_leader)
            .count();
        assert_eq!(leaders, 1);
    }

    a.stop().await;
    b.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_successor_takes_over_after_graceful_stop() {
    let kv = MemoryKv::new();
    let provider = MockMeetingProvider::new();

    let a = coordinator(&kv, &provider, "fc-a");
    let b = coordinator(&kv, &provider, "fc-b");
    a.start();
    tokio::time::sleep(Duration::from_millis(10)).await;
    b.start();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(a.status().is_leader);
    assert!(!b.status().is_leader);

    a.stop().await;

    // Released, so B wins on its next heartbeat rather than after the TTL.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(b.status().is_leader);
    assert_eq!(kv.value(LEASE_KEY).as_deref(), Some("fc-b"));

    b.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_successor_takes_over_after_crash() {
    let kv = MemoryKv::new();
    let provider = MockMeetingProvider::new();

    let a = coordinator(&kv, &provider, "fc-a");
    let b = coordinator(&kv, &provider, "fc-b");
    a.start();
    tokio::time::sleep(Duration::from_millis(10)).await;
    b.start();

    // Dropping cancels A's tasks without releasing the lease.
    drop(a);
    assert_eq!(kv.value(LEASE_KEY).as_deref(), Some("fc-a"));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!b.status().is_leader, "Lease still within TTL");

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(b.status().is_leader);

    b.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_losing_lease_stops_reconciliation() {
    let kv = MemoryKv::new();
    let provider = MockMeetingProvider::new();

    let a = coordinator(&kv, &provider, "fc-a");
    a.start();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(a.status().is_leader);

    // Another process holds the record now.
    kv.insert_with_ttl(LEASE_KEY, "fc-other", Duration::from_secs(60));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!a.status().is_leader);

    seed_meeting(&kv, "gone", "mtg-1");
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(kv.contains_key("meeting:gone"), "Followers never sweep");
    assert!(provider.delete_calls().is_empty());

    a.stop().await;
    assert_eq!(kv.value(LEASE_KEY).as_deref(), Some("fc-other"));
}

#[tokio::test(start_paused = true)]
async fn test_store_outage_demotes_then_recovers() {
    let kv = MemoryKv::new();
    let provider = MockMeetingProvider::new();

    let a = coordinator(&kv, &provider, "fc-a");
    a.start();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(a.status().is_leader);

    kv.fail_all(true);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!a.status().is_leader);

    kv.clear_failures();
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(a.status().is_leader, "Re-acquires once the old record expires");

    a.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_hung_store_calls_stop_reconciliation() {
    let kv = MemoryKv::new();
    let provider = MockMeetingProvider::new();

    let a = coordinator(&kv, &provider, "fc-a");
    a.start();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(a.status().is_leader);

    // A's connection goes half-open: lease calls stop answering.
    kv.hang_operation("expire_if_equals");
    kv.hang_operation("set_if_absent");
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!a.status().is_leader);

    // The record expired at t=3; a successor now holds it.
    kv.insert_with_ttl(LEASE_KEY, "fc-b", Duration::from_secs(60));

    let scans = kv.call_count("scan");
    seed_meeting(&kv, "gone", "mtg-1");
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(!a.status().is_leader);
    assert_eq!(kv.call_count("scan"), scans, "Former leader no longer sweeps");
    assert!(provider.delete_calls().is_empty());
    assert!(kv.contains_key("meeting:gone"));

    a.stop().await;
    assert_eq!(kv.value(LEASE_KEY).as_deref(), Some("fc-b"));
}
