//! Mock meeting provider.
//!
//! Records every create and delete call. Deletes succeed unless configured
//! to fail, either for every meeting or for specific meeting ids.

use async_trait::async_trait;
use fleet_coordinator::errors::FcError;
use fleet_coordinator::meetings::{Meeting, MeetingProvider};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Recording `MeetingProvider`.
#[derive(Debug, Clone, Default)]
pub struct MockMeetingProvider {
    inner: Arc<Mutex<MockProviderInner>>,
}

#[derive(Debug, Default)]
struct MockProviderInner {
    created: Vec<String>,
    delete_calls: Vec<String>,
    fail_all_deletes: bool,
    failing_meetings: HashSet<String>,
    fail_creates: bool,
}

impl MockMeetingProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delete returns `false`.
    #[must_use]
    pub fn with_failing_deletes(self) -> Self {
        self.set_deletes_failing(true);
        self
    }

    /// Deletes of this meeting return `false`.
    #[must_use]
    pub fn with_failing_meeting(self, meeting_id: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .failing_meetings
            .insert(meeting_id.to_string());
        self
    }

    /// Every create returns an error.
    #[must_use]
    pub fn with_failing_creates(self) -> Self {
        self.inner.lock().unwrap().fail_creates = true;
        self
    }

    /// Toggle failure of all deletes, e.g. to model a provider recovering.
    pub fn set_deletes_failing(&self, failing: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_all_deletes = failing;
        if !failing {
            inner.failing_meetings.clear();
        }
    }

    /// Meeting ids passed to `delete_meeting`, in call order.
    pub fn delete_calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().delete_calls.clone()
    }

    /// How many times deletion of `meeting_id` was attempted.
    pub fn delete_attempts(&self, meeting_id: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .delete_calls
            .iter()
            .filter(|id| id.as_str() == meeting_id)
            .count()
    }

    /// Room ids passed to `create_meeting`, in call order.
    pub fn created_for(&self) -> Vec<String> {
        self.inner.lock().unwrap().created.clone()
    }
}

#[async_trait]
impl MeetingProvider for MockMeetingProvider {
    async fn create_meeting(&self, room_id: &str) -> Result<Meeting, FcError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_creates {
            return Err(FcError::Provider("injected create failure".to_string()));
        }
        inner.created.push(room_id.to_string());
        let id = format!("mtg-{room_id}-{}", inner.created.len());
        Ok(Meeting {
            url: format!("https://calls.test/{id}"),
            id,
        })
    }

    async fn delete_meeting(&self, meeting_id: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.delete_calls.push(meeting_id.to_string());
        !(inner.fail_all_deletes || inner.failing_meetings.contains(meeting_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls_and_fails_selected_meetings() {
        let provider = MockMeetingProvider::new().with_failing_meeting("mtg-bad");

        assert!(provider.delete_meeting("mtg-ok").await);
        assert!(!provider.delete_meeting("mtg-bad").await);
        assert!(!provider.delete_meeting("mtg-bad").await);

        assert_eq!(provider.delete_calls(), vec!["mtg-ok", "mtg-bad", "mtg-bad"]);
        assert_eq!(provider.delete_attempts("mtg-bad"), 2);

        provider.set_deletes_failing(false);
        assert!(provider.delete_meeting("mtg-bad").await);
    }

    #[tokio::test]
    async fn test_create_meeting() {
        let provider = MockMeetingProvider::new();
        let meeting = provider.create_meeting("room-1").await.unwrap();
        assert_eq!(meeting.id, "mtg-room-1-1");
        assert_eq!(provider.created_for(), vec!["room-1"]);

        let failing = MockMeetingProvider::new().with_failing_creates();
        assert!(failing.create_meeting("room-1").await.is_err());
    }
}
