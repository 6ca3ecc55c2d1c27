//! Key layout of the shared store.
//!
//! | Key | Value | Owner |
//! |-----|-------|-------|
//! | `fleet:leader` | holder server id (PX = lease TTL) | lease manager |
//! | `room:{id}` | room JSON document | CRUD layer |
//! | `room_code:{CODE}` | room id | CRUD layer |
//! | `chat:{id}` | chat history | CRUD layer |
//! | `meeting:{room_id}` | external meeting id | CRUD layer / reconciler |
//! | `meeting_cleanup:{room_id}` | failed external deletions | reconciler |

pub const ROOM_PREFIX: &str = "room:";
pub const ROOM_CODE_PREFIX: &str = "room_code:";
pub const CHAT_PREFIX: &str = "chat:";
pub const MEETING_PREFIX: &str = "meeting:";
pub const MEETING_CLEANUP_PREFIX: &str = "meeting_cleanup:";

#[must_use]
pub fn room(room_id: &str) -> String {
    format!("{ROOM_PREFIX}{room_id}")
}

#[must_use]
pub fn room_code(code: &str) -> String {
    format!("{ROOM_CODE_PREFIX}{code}")
}

#[must_use]
pub fn chat(room_id: &str) -> String {
    format!("{CHAT_PREFIX}{room_id}")
}

#[must_use]
pub fn meeting(room_id: &str) -> String {
    format!("{MEETING_PREFIX}{room_id}")
}

#[must_use]
pub fn meeting_cleanup(room_id: &str) -> String {
    format!("{MEETING_CLEANUP_PREFIX}{room_id}")
}

/// Extract the room id from a `room:{id}` key.
///
/// Returns `None` for keys outside the prefix and for nested keys
/// (`room:{id}:something`), which are not room records.
#[must_use]
pub fn room_id_from_room_key(key: &str) -> Option<&str> {
    id_after(key, ROOM_PREFIX)
}

/// Extract the room id from a `meeting:{room_id}` key.
#[must_use]
pub fn room_id_from_meeting_key(key: &str) -> Option<&str> {
    id_after(key, MEETING_PREFIX)
}

fn id_after<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)
        .filter(|id| !id.is_empty() && !id.contains(':'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        assert_eq!(room("r-1"), "room:r-1");
        assert_eq!(room_code("QXZT"), "room_code:QXZT");
        assert_eq!(chat("r-1"), "chat:r-1");
        assert_eq!(meeting("r-1"), "meeting:r-1");
        assert_eq!(meeting_cleanup("r-1"), "meeting_cleanup:r-1");
    }

    #[test]
    fn test_prefixes_do_not_overlap() {
        // A `room:*` scan must not pick up join-code keys, and a `meeting:*`
        // scan must not pick up retry counters.
        assert!(!room_code("ABCD").starts_with(ROOM_PREFIX));
        assert!(!meeting_cleanup("r-1").starts_with(MEETING_PREFIX));
    }

    #[test]
    fn test_room_id_extraction() {
        assert_eq!(room_id_from_room_key("room:abc"), Some("abc"));
        assert_eq!(room_id_from_room_key("room:"), None);
        assert_eq!(room_id_from_room_key("room:abc:players"), None);
        assert_eq!(room_id_from_room_key("chat:abc"), None);

        assert_eq!(room_id_from_meeting_key("meeting:abc"), Some("abc"));
        assert_eq!(room_id_from_meeting_key("meeting_cleanup:abc"), None);
    }
}
