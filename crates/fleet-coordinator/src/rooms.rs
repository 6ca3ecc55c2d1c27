//! Room records as seen by the reconciler.
//!
//! Rooms are written by the request-handling layer as JSON documents under
//! `room:{id}`. The coordinator only reads them (to decide whether a room is
//! abandoned) and deletes them once they are.

use crate::errors::FcError;
use crate::store::{keys, KvStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Lifecycle state of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomState {
    Lobby,
    Playing,
    Finished,
}

/// A player entry in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_connected: bool,
}

/// Room document stored under `room:{id}`.
///
/// Only the fields the coordinator reasons about are typed; `settings` and
/// `game_state` are carried as opaque JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub code: String,
    pub host_id: String,
    pub state: RoomState,
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default)]
    pub settings: serde_json::Value,
    #[serde(default)]
    pub game_state: Option<serde_json::Value>,
    /// Creation time, unix milliseconds.
    #[serde(default)]
    pub created_at: i64,
}

impl Room {
    #[must_use]
    pub fn connected_player_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_connected).count()
    }

    /// A host that is missing from the player list counts as disconnected.
    #[must_use]
    pub fn is_host_connected(&self) -> bool {
        self.players
            .iter()
            .any(|p| p.id == self.host_id && p.is_connected)
    }

    /// The host is gone, or nobody is connected at all.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        !self.is_host_connected() || self.connected_player_count() == 0
    }
}

/// Read/delete accessor for room records.
#[derive(Clone)]
pub struct RoomStore {
    store: Arc<dyn KvStore>,
}

impl RoomStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Fetch a room by id.
    ///
    /// # Errors
    ///
    /// `FcError::Redis` on store failure, `FcError::Serialization` if the
    /// stored document is not a valid room.
    #[instrument(skip_all, fields(room_id = %room_id))]
    pub async fn get_room(&self, room_id: &str) -> Result<Option<Room>, FcError> {
        let Some(json) = self.store.get(&keys::room(room_id)).await? else {
            return Ok(None);
        };

        let room: Room = serde_json::from_str(&json).map_err(|e| {
            warn!(
                target: "fc.rooms",
                error = %e,
                room_id = %room_id,
                "Failed to deserialize room"
            );
            FcError::Serialization(format!("room {room_id}: {e}"))
        })?;

        Ok(Some(room))
    }

    /// Delete a room record together with its chat history and join-code index.
    ///
    /// `code` is the room's join code when known; the index entry is only
    /// removed if it still points at this room.
    #[instrument(skip_all, fields(room_id = %room_id))]
    pub async fn delete_room(&self, room_id: &str, code: Option<&str>) -> Result<(), FcError> {
        if let Some(code) = code {
            self.store
                .delete_if_equals(&keys::room_code(code), room_id)
                .await?;
        }

        let removed = self
            .store
            .delete_many(&[keys::room(room_id), keys::chat(room_id)])
            .await?;

        debug!(
            target: "fc.rooms",
            room_id = %room_id,
            removed_keys = removed,
            "Deleted room"
        );

        Ok(())
    }
}
