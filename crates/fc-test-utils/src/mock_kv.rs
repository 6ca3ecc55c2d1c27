//! In-memory `KvStore` for coordinator testing.
//!
//! Implements every store operation the coordinator uses, including the
//! holder-checked lease operations, with the same observable semantics as
//! Redis:
//! - keys expire once `tokio::time::Instant::now()` reaches their deadline
//! - `set` without a TTL clears any previous expiry
//! - `scan` pages through keys in sorted order; cursor `0` ends the scan
//!
//! # Fault Injection
//!
//! ```rust,ignore
//! let kv = MemoryKv::new();
//! kv.fail_operation("expire_if_equals"); // only lease renewals fail
//! kv.fail_all(true);                     // every operation fails
//! kv.hang_operation("expire_if_equals"); // renewals never answer
//! kv.clear_failures();
//! ```
//!
//! Clones share state, so one `MemoryKv` can back several lease managers to
//! simulate a fleet.

use async_trait::async_trait;
use fleet_coordinator::errors::FcError;
use fleet_coordinator::store::{KvStore, ScanPage};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Mock shared store.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    inner: Arc<Mutex<MemoryKvInner>>,
}

#[derive(Debug, Default)]
struct MemoryKvInner {
    /// Sorted so scan pages are stable between calls.
    entries: BTreeMap<String, Entry>,
    /// Every operation fails while set.
    fail_all: bool,
    /// Operations that fail.
    failing_ops: HashSet<&'static str>,
    /// Operations that never complete.
    hanging_ops: HashSet<&'static str>,
    /// Calls per operation name.
    calls: HashMap<&'static str, usize>,
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| now < deadline)
    }
}

impl MemoryKvInner {
    fn purge_expired(&mut self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));
    }

    /// Count the call and apply fault injection.
    fn begin(&mut self, op: &'static str) -> Result<(), FcError> {
        *self.calls.entry(op).or_insert(0) += 1;
        if self.fail_all || self.failing_ops.contains(op) {
            return Err(FcError::Redis(format!("injected failure: {op}")));
        }
        self.purge_expired();
        Ok(())
    }

    fn live_value(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|entry| entry.value.as_str())
    }
}

impl MemoryKv {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a key without expiry.
    pub fn insert(&self, key: &str, value: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
    }

    /// Write a key that expires after `ttl`.
    pub fn insert_with_ttl(&self, key: &str, value: &str, ttl: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
    }

    /// Current value of a key, honouring expiry.
    pub fn value(&self, key: &str) -> Option<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_expired();
        inner.live_value(key).map(str::to_string)
    }

    /// Whether a live key exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.value(key).is_some()
    }

    /// Remaining time to live, `None` if the key is absent or has no expiry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_expired();
        inner
            .entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Remove a key out of band.
    pub fn remove(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.remove(key).is_some()
    }

    /// All live keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_expired();
        inner.entries.keys().cloned().collect()
    }

    /// Make every operation fail (or stop failing).
    pub fn fail_all(&self, fail: bool) {
        self.inner.lock().unwrap().fail_all = fail;
    }

    /// Make one operation fail, e.g. `"scan"` or `"expire_if_equals"`.
    pub fn fail_operation(&self, op: &'static str) {
        self.inner.lock().unwrap().failing_ops.insert(op);
    }

    /// Make one operation hang forever, like a half-open connection.
    pub fn hang_operation(&self, op: &'static str) {
        self.inner.lock().unwrap().hanging_ops.insert(op);
    }

    /// Remove all injected failures and hangs.
    pub fn clear_failures(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_all = false;
        inner.failing_ops.clear();
        inner.hanging_ops.clear();
    }

    /// Park forever if `op` is set to hang. The call is counted either way.
    async fn stall_if_hanging(&self, op: &'static str) {
        let hanging = {
            let mut inner = self.inner.lock().unwrap();
            if inner.hanging_ops.contains(op) {
                *inner.calls.entry(op).or_insert(0) += 1;
                true
            } else {
                false
            }
        };
        if hanging {
            std::future::pending::<()>().await;
        }
    }

    /// How many times an operation was called, failed calls included.
    pub fn call_count(&self, op: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.calls.get(op).copied().unwrap_or(0)
    }

    /// Total calls to mutating operations.
    pub fn mutation_count(&self) -> usize {
        [
            "set",
            "delete",
            "delete_many",
            "set_if_absent",
            "expire",
            "expire_if_equals",
            "delete_if_equals",
        ]
        .iter()
        .map(|op| self.call_count(op))
        .sum()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, FcError> {
        self.stall_if_hanging("get").await;
        let mut inner = self.inner.lock().unwrap();
        inner.begin("get")?;
        Ok(inner.live_value(key).map(str::to_string))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), FcError> {
        self.stall_if_hanging("set").await;
        let mut inner = self.inner.lock().unwrap();
        inner.begin("set")?;
        inner.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, FcError> {
        self.stall_if_hanging("delete").await;
        let mut inner = self.inner.lock().unwrap();
        inner.begin("delete")?;
        Ok(inner.entries.remove(key).is_some())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64, FcError> {
        self.stall_if_hanging("delete_many").await;
        let mut inner = self.inner.lock().unwrap();
        inner.begin("delete_many")?;
        let removed = keys
            .iter()
            .filter(|key| inner.entries.remove(key.as_str()).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn scan(&self, prefix: &str, cursor: u64, count: usize) -> Result<ScanPage, FcError> {
        self.stall_if_hanging("scan").await;
        let mut inner = self.inner.lock().unwrap();
        inner.begin("scan")?;

        let matching: Vec<String> = inner
            .entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();

        let start = usize::try_from(cursor).unwrap_or(usize::MAX);
        let end = start.saturating_add(count.max(1)).min(matching.len());
        let keys = matching.get(start..end).map(<[String]>::to_vec).unwrap_or_default();
        let next = if end >= matching.len() { 0 } else { end as u64 };

        Ok(ScanPage { cursor: next, keys })
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, FcError> {
        self.stall_if_hanging("set_if_absent").await;
        let mut inner = self.inner.lock().unwrap();
        inner.begin("set_if_absent")?;
        if inner.entries.contains_key(key) {
            return Ok(false);
        }
        inner.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, FcError> {
        self.stall_if_hanging("expire").await;
        let mut inner = self.inner.lock().unwrap();
        inner.begin("expire")?;
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn expire_if_equals(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, FcError> {
        self.stall_if_hanging("expire_if_equals").await;
        let mut inner = self.inner.lock().unwrap();
        inner.begin("expire_if_equals")?;
        match inner.entries.get_mut(key) {
            Some(entry) if entry.value == expected => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, FcError> {
        self.stall_if_hanging("delete_if_equals").await;
        let mut inner = self.inner.lock().unwrap();
        inner.begin("delete_if_equals")?;
        if inner.live_value(key) == Some(expected) {
            inner.entries.remove(key);
            return Ok(true);
        }
        Ok(false)
    }
}
