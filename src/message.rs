//! Event protocol definitions
//!
//! JSON-based bidirectional event protocol using Serde's tagged enum
//! for type-safe serialization/deserialization.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::truncate_chars;

/// Maximum length of a chat or stranger message in characters
pub const MAX_MESSAGE_LEN: usize = 2000;

/// Client → Server event
///
/// All events from client to server. Uses tagged enum with snake_case naming.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Join a named room (leaving the current one, if any)
    Join {
        #[serde(default)]
        room: String,
    },
    /// Send a message to the current room
    ChatMessage { text: String },
    /// Typing indicator for the current room
    Typing { is_typing: bool },
    /// Request an anonymous partner from the waiting pool
    FindStranger,
    /// Send a message to the current stranger partner
    StrangerMessage { text: String },
    /// Leave the waiting pool or the current pairing
    LeaveStranger,
}

/// A room message record with server-assigned id and timestamp
///
/// This is both the wire shape of the `chat_message` event and the record
/// persisted to the history store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomMessage {
    pub id: String,
    pub username: String,
    pub room: String,
    pub text: String,
    /// Unix epoch milliseconds, assigned at send time
    pub ts: i64,
}

impl RoomMessage {
    /// Build a record from raw client text, capping length and stamping id/ts
    pub fn new(username: &str, room: &str, text: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            room: room.to_string(),
            text: truncate_chars(text, MAX_MESSAGE_LEN).to_string(),
            ts: Utc::now().timestamp_millis(),
        }
    }
}

/// A stranger message record
///
/// Same shape as [`RoomMessage`] minus the room; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct StrangerMessage {
    pub id: String,
    pub username: String,
    pub text: String,
    pub ts: i64,
}

impl StrangerMessage {
    pub fn new(username: &str, text: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            text: truncate_chars(text, MAX_MESSAGE_LEN).to_string(),
            ts: Utc::now().timestamp_millis(),
        }
    }
}

/// Server → Client event
///
/// All events from server to client. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Informational notice for one connection or a whole room
    SystemMessage { text: String },
    /// Room message, broadcast to every member including the sender
    ChatMessage(RoomMessage),
    /// Typing state of a room member, sent to everyone except them
    Typing { username: String, is_typing: bool },
    /// Live membership count of a room
    Presence { room: String, count: usize },
    /// Recent room backlog replayed to a joining connection, oldest first
    History { messages: Vec<RoomMessage> },
    /// The requester was put into the waiting pool
    WaitingStranger,
    /// A pairing was formed; sent to both ends
    StrangerFound,
    /// Anonymous message, delivered to both ends of a pairing
    StrangerMessage(StrangerMessage),
    /// The partner left the pairing; sent to the remaining end
    StrangerLeft,
    /// The receiver itself left or was torn out of its pairing
    YouDisconnected,
    /// No valid identity at accept time; the connection will be closed
    Unauthorized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_event_deserialize() {
        let json = r#"{"type": "join", "room": "general"}"#;
        let msg: ClientEvent = serde_json::from_str(json).unwrap();
        match msg {
            ClientEvent::Join { room } => assert_eq!(room, "general"),
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_join_without_room_defaults_empty() {
        let json = r#"{"type": "join"}"#;
        let msg: ClientEvent = serde_json::from_str(json).unwrap();
        match msg {
            ClientEvent::Join { room } => assert!(room.is_empty()),
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_typing_deserialize() {
        let json = r#"{"type": "typing", "is_typing": true}"#;
        let msg: ClientEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientEvent::Typing { is_typing: true }));
    }

    #[test]
    fn test_server_event_serialize() {
        let msg = ServerEvent::Presence {
            room: "general".to_string(),
            count: 3,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"presence\""));
        assert!(json.contains("\"count\":3"));
    }

    #[test]
    fn test_chat_message_flattens_record() {
        let record = RoomMessage::new("alice", "general", "hi");
        let json = serde_json::to_string(&ServerEvent::ChatMessage(record)).unwrap();
        assert!(json.contains("\"type\":\"chat_message\""));
        assert!(json.contains("\"username\":\"alice\""));
        assert!(json.contains("\"room\":\"general\""));
        assert!(json.contains("\"ts\":"));
    }

    #[test]
    fn test_unit_event_serialize() {
        let json = serde_json::to_string(&ServerEvent::StrangerLeft).unwrap();
        assert_eq!(json, r#"{"type":"stranger_left"}"#);
    }

    #[test]
    fn test_room_message_caps_text() {
        let long = "a".repeat(MAX_MESSAGE_LEN + 100);
        let record = RoomMessage::new("alice", "general", &long);
        assert_eq!(record.text.chars().count(), MAX_MESSAGE_LEN);
    }
}
