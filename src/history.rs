//! Room message history
//!
//! The coordinator treats history as an opaque collaborator behind the
//! [`HistoryStore`] trait: append on send, read a bounded backlog on join.
//! [`MemoryHistory`] is the in-process implementation, keeping a bounded
//! window of recent messages per room.

use std::collections::{HashMap, VecDeque};

use crate::message::RoomMessage;
use crate::types::RoomName;

/// Number of backlog messages replayed to a joining connection
pub const BACKLOG_LIMIT: usize = 30;

/// Messages retained per room by the in-memory store
pub const IN_MEMORY_CACHE_SIZE: usize = 200;

/// History collaborator contract
pub trait HistoryStore {
    /// Persist a room message record
    fn append(&mut self, room: &RoomName, message: RoomMessage);

    /// Up to `limit` most recent records for a room, oldest first
    fn recent(&self, room: &RoomName, limit: usize) -> Vec<RoomMessage>;
}

/// In-memory history store with a bounded window per room
#[derive(Debug, Default)]
pub struct MemoryHistory {
    rooms: HashMap<RoomName, VecDeque<RoomMessage>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistory {
    fn append(&mut self, room: &RoomName, message: RoomMessage) {
        let messages = self.rooms.entry(room.clone()).or_default();
        if messages.len() == IN_MEMORY_CACHE_SIZE {
            messages.pop_front();
        }
        messages.push_back(message);
    }

    fn recent(&self, room: &RoomName, limit: usize) -> Vec<RoomMessage> {
        let Some(messages) = self.rooms.get(room) else {
            return Vec::new();
        };
        let skip = messages.len().saturating_sub(limit);
        messages.iter().skip(skip).cloned().collect()
    }
}
