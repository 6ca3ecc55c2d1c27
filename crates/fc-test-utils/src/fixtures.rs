//! Test fixtures for rooms and meeting mappings.
//!
//! ```rust,ignore
//! let room = RoomBuilder::new("room-3")
//!     .host("alice", false)
//!     .player("bob", true)
//!     .seed(&kv);
//! ```

use crate::mock_kv::MemoryKv;
use fleet_coordinator::rooms::{Player, Room, RoomState};
use fleet_coordinator::store::keys;

/// Builder for room documents.
#[derive(Debug, Clone)]
pub struct RoomBuilder {
    room: Room,
}

impl RoomBuilder {
    /// A playing room with no players. The join code is the upper-cased id.
    #[must_use]
    pub fn new(room_id: &str) -> Self {
        Self {
            room: Room {
                id: room_id.to_string(),
                code: room_id.to_uppercase(),
                host_id: String::new(),
                state: RoomState::Playing,
                players: Vec::new(),
                settings: serde_json::json!({ "maxPlayers": 8 }),
                game_state: None,
                created_at: chrono::Utc::now().timestamp_millis(),
            },
        }
    }

    /// Add a player and make them host.
    #[must_use]
    pub fn host(mut self, player_id: &str, connected: bool) -> Self {
        self.room.host_id = player_id.to_string();
        self.player(player_id, connected)
    }

    /// Add a player.
    #[must_use]
    pub fn player(mut self, player_id: &str, connected: bool) -> Self {
        self.room.players.push(Player {
            id: player_id.to_string(),
            name: player_id.to_string(),
            is_connected: connected,
        });
        self
    }

    #[must_use]
    pub fn state(mut self, state: RoomState) -> Self {
        self.room.state = state;
        self
    }

    #[must_use]
    pub fn code(mut self, code: &str) -> Self {
        self.room.code = code.to_string();
        self
    }

    /// Write the room, its join-code index and an empty chat history.
    pub fn seed(self, kv: &MemoryKv) -> Room {
        let room = self.room;
        kv.insert(&keys::room(&room.id), &serde_json::to_string(&room).unwrap());
        kv.insert(&keys::room_code(&room.code), &room.id);
        kv.insert(&keys::chat(&room.id), "[]");
        room
    }
}

/// Map a room to an external meeting.
pub fn seed_meeting(kv: &MemoryKv, room_id: &str, meeting_id: &str) {
    kv.insert(&keys::meeting(room_id), meeting_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_writes_room_code_and_chat() {
        let kv = MemoryKv::new();
        let room = RoomBuilder::new("room-1")
            .host("alice", true)
            .player("bob", false)
            .state(RoomState::Lobby)
            .seed(&kv);

        assert_eq!(room.host_id, "alice");
        assert_eq!(room.players.len(), 2);
        assert_eq!(kv.value("room_code:ROOM-1").as_deref(), Some("room-1"));
        assert!(kv.contains_key("chat:room-1"));

        let stored: Room = serde_json::from_str(&kv.value("room:room-1").unwrap()).unwrap();
        assert_eq!(stored, room);
    }
}
