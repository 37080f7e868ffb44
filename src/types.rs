//! Basic type definitions for the relay
//!
//! Provides newtype wrappers for type safety:
//! - `ConnId`: UUID-based unique connection identifier
//! - `RoomName`: normalized room name (trimmed, defaulted, length-capped)

use uuid::Uuid;

/// Room name used when a client joins with an empty or missing name
pub const DEFAULT_ROOM: &str = "lobby";

/// Maximum length of a room name in characters
pub const MAX_ROOM_NAME_LEN: usize = 64;

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4 for type-safe connection identification.
/// Implements Hash and Eq for use as HashMap keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(pub Uuid);

impl ConnId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalized room name
///
/// Construction always goes through [`RoomName::normalize`], so a stored
/// name is never empty, never padded with whitespace, and never longer
/// than [`MAX_ROOM_NAME_LEN`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomName(String);

impl RoomName {
    /// Normalize raw client input into a valid room name
    ///
    /// Trims surrounding whitespace, falls back to [`DEFAULT_ROOM`] when the
    /// result is empty, and truncates to [`MAX_ROOM_NAME_LEN`] characters.
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self(DEFAULT_ROOM.to_string());
        }
        Self(truncate_chars(trimmed, MAX_ROOM_NAME_LEN).to_string())
    }

    /// The room name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Truncate a string to at most `max` characters on a char boundary
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conn_id_unique() {
        let id1 = ConnId::new();
        let id2 = ConnId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_room_name_trimmed() {
        let room = RoomName::normalize("  general  ");
        assert_eq!(room.as_str(), "general");
    }

    #[test]
    fn test_room_name_empty_falls_back() {
        assert_eq!(RoomName::normalize("").as_str(), DEFAULT_ROOM);
        assert_eq!(RoomName::normalize("   ").as_str(), DEFAULT_ROOM);
    }

    #[test]
    fn test_room_name_capped() {
        let long = "x".repeat(200);
        let room = RoomName::normalize(&long);
        assert_eq!(room.as_str().chars().count(), MAX_ROOM_NAME_LEN);
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        // Must cut on a char boundary, not a byte offset
        let s = "héllo wörld";
        assert_eq!(truncate_chars(s, 4), "héll");
        assert_eq!(truncate_chars(s, 100), s);
    }
}
