//! Voice-call meetings.
//!
//! Two halves:
//! - [`MeetingProvider`] - the third-party call-hosting API (create/delete)
//! - [`MeetingRegistry`] - the shared `meeting:{room_id}` mapping to the
//!   provider's meeting id, plus the failed-deletion counter used by the
//!   reconciler's bounded retry policy

pub mod http_client;

pub use http_client::HttpMeetingProvider;

use crate::errors::FcError;
use crate::store::{keys, KvStore};
use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// A meeting created by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: String,
    #[serde(default)]
    pub url: String,
}

/// Meeting provider client settings.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub timeout: Duration,
}

/// Third-party call-hosting API.
#[async_trait]
pub trait MeetingProvider: Send + Sync {
    /// Create a meeting for a room.
    async fn create_meeting(&self, room_id: &str) -> Result<Meeting, FcError>;

    /// Delete a meeting.
    ///
    /// Never errors: any failure (non-2xx, network, timeout) is reported as
    /// `false`. A meeting the provider no longer knows about counts as deleted.
    async fn delete_meeting(&self, meeting_id: &str) -> bool;
}

/// Accessor for meeting mappings in the shared store.
#[derive(Clone)]
pub struct MeetingRegistry {
    store: Arc<dyn KvStore>,
}

impl MeetingRegistry {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Record `meeting_id` for a room unless one is already recorded.
    ///
    /// Returns `false` if another request got there first; the caller should
    /// then discard the meeting it created and use [`Self::get`].
    #[instrument(skip_all, fields(room_id = %room_id))]
    pub async fn claim(
        &self,
        room_id: &str,
        meeting_id: &str,
        ttl: Duration,
    ) -> Result<bool, FcError> {
        self.store
            .set_if_absent(&keys::meeting(room_id), meeting_id, ttl)
            .await
    }

    #[instrument(skip_all, fields(room_id = %room_id))]
    pub async fn get(&self, room_id: &str) -> Result<Option<String>, FcError> {
        self.store.get(&keys::meeting(room_id)).await
    }

    /// Remove the mapping and its failed-deletion counter.
    #[instrument(skip_all, fields(room_id = %room_id))]
    pub async fn delete(&self, room_id: &str) -> Result<(), FcError> {
        self.store
            .delete_many(&[keys::meeting(room_id), keys::meeting_cleanup(room_id)])
            .await?;
        debug!(target: "fc.meetings", room_id = %room_id, "Deleted meeting mapping");
        Ok(())
    }

    /// Count one more failed external deletion and return the new total.
    ///
    /// Only the lease holder calls this, so read-then-write is sufficient.
    #[instrument(skip_all, fields(room_id = %room_id))]
    pub async fn record_failed_delete(&self, room_id: &str, ttl: Duration) -> Result<u32, FcError> {
        let key = keys::meeting_cleanup(room_id);
        let attempts = self
            .store
            .get(&key)
            .await?
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(0)
            .saturating_add(1);

        self.store
            .set(&key, &attempts.to_string(), Some(ttl))
            .await?;

        Ok(attempts)
    }
}
