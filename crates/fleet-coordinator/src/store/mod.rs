//! Shared key-value store facade.
//!
//! This module provides:
//! - `KvStore` - the store contract the coordination core consumes
//! - `RedisKvStore` - Redis implementation
//! - `keys` - key layout
//! - Lua scripts for holder-checked lease operations
//!
//! The trait is the mocking seam: tests run the lease manager and reconciler
//! against an in-memory implementation from `fc-test-utils`.

pub mod keys;
pub mod lua_scripts;
pub mod redis;

pub use self::redis::{RedisKvStore, RedisStoreConfig};

use crate::errors::FcError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;

/// One page of a prefix scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next call. `0` means the scan is complete.
    pub cursor: u64,
    /// Keys in this page. May contain keys already returned by earlier pages.
    pub keys: Vec<String>,
}

/// Shared key-value store contract.
///
/// Every call is a suspension point and may fail with `FcError::Redis`.
/// TTLs are honoured with at least millisecond granularity.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a key.
    async fn get(&self, key: &str) -> Result<Option<String>, FcError>;

    /// Write a key, replacing any existing value and expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), FcError>;

    /// Delete a key. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, FcError>;

    /// Delete several keys. Returns how many existed.
    async fn delete_many(&self, keys: &[String]) -> Result<u64, FcError>;

    /// Return one page of keys starting with `prefix`.
    async fn scan(&self, prefix: &str, cursor: u64, count: usize) -> Result<ScanPage, FcError>;

    /// Atomically write `value` only if `key` is absent. Returns whether it was written.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
        -> Result<bool, FcError>;

    /// Reset the expiry of an existing key. Returns whether the key existed.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, FcError>;

    /// Atomically reset the expiry only if the key currently holds `expected`.
    async fn expire_if_equals(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, FcError>;

    /// Atomically delete the key only if it currently holds `expected`.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, FcError>;
}

/// Follow scan cursors until exhausted and return every distinct key.
pub async fn scan_prefix(
    store: &dyn KvStore,
    prefix: &str,
    count: usize,
) -> Result<Vec<String>, FcError> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    let mut cursor = 0;

    loop {
        let page = store.scan(prefix, cursor, count).await?;
        for key in page.keys {
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
        if page.cursor == 0 {
            break;
        }
        cursor = page.cursor;
    }

    Ok(keys)
}
