//! HTTP client for the meeting provider API.
//!
//! # Endpoints
//!
//! - `POST {base}/meetings` with `{"name": room_id}` -> `{"id", "url"}`
//! - `DELETE {base}/meetings/{id}`
//!
//! Both authenticate with `Authorization: Bearer <api key>`.

use super::{Meeting, MeetingProvider, ProviderConfig};
use crate::errors::FcError;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, instrument, warn};

#[derive(Serialize)]
struct CreateMeetingRequest<'a> {
    name: &'a str,
}

/// reqwest-backed [`MeetingProvider`].
pub struct HttpMeetingProvider {
    client: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
}

impl HttpMeetingProvider {
    /// Build a provider client.
    ///
    /// # Errors
    ///
    /// Returns `FcError::Config` if the base URL is not an absolute
    /// hierarchical URL or the HTTP client cannot be constructed.
    pub fn new(config: ProviderConfig) -> Result<Self, FcError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| FcError::Config(format!("Invalid meeting provider URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(FcError::Config(
                "Meeting provider URL must be hierarchical".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FcError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key,
        })
    }

    /// `{base}/meetings/{segments...}`, each segment percent-encoded.
    fn meetings_url(&self, segments: &[&str]) -> Result<Url, FcError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| FcError::Config("Meeting provider URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push("meetings")
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl MeetingProvider for HttpMeetingProvider {
    #[instrument(skip_all, fields(room_id = %room_id))]
    async fn create_meeting(&self, room_id: &str) -> Result<Meeting, FcError> {
        let response = self
            .client
            .post(self.meetings_url(&[])?)
            .bearer_auth(self.api_key.expose_secret())
            .json(&CreateMeetingRequest { name: room_id })
            .send()
            .await
            .map_err(|e| {
                warn!(target: "fc.meetings", error = %e, "Create meeting request failed");
                FcError::Provider(format!("create request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                target: "fc.meetings",
                status = status.as_u16(),
                "Create meeting rejected"
            );
            return Err(FcError::Provider(format!("create returned {status}")));
        }

        let meeting: Meeting = response.json().await.map_err(|e| {
            warn!(target: "fc.meetings", error = %e, "Invalid create meeting response");
            FcError::Provider(format!("invalid create response: {e}"))
        })?;

        debug!(target: "fc.meetings", meeting_id = %meeting.id, "Created meeting");
        Ok(meeting)
    }

    #[instrument(skip_all, fields(meeting_id = %meeting_id))]
    async fn delete_meeting(&self, meeting_id: &str) -> bool {
        let url = match self.meetings_url(&[meeting_id]) {
            Ok(url) => url,
            Err(e) => {
                warn!(target: "fc.meetings", error = %e, "Cannot build delete meeting URL");
                return false;
            }
        };

        let response = match self
            .client
            .delete(url)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(target: "fc.meetings", error = %e, "Delete meeting request failed");
                return false;
            }
        };

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            debug!(
                target: "fc.meetings",
                status = status.as_u16(),
                "Deleted meeting"
            );
            true
        } else {
            warn!(
                target: "fc.meetings",
                status = status.as_u16(),
                "Delete meeting rejected"
            );
            false
        }
    }
}
