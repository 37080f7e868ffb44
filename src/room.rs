//! Room directory
//!
//! Maps room names to their member sets. Rooms are created on first join and
//! removed as soon as their member set empties; membership counts are derived
//! from set sizes, never tracked separately.

use std::collections::{HashMap, HashSet};

use crate::types::{ConnId, RoomName};

/// Directory of all live rooms and their members
///
/// The directory only tracks set membership. The invariant that a connection
/// sits in at most one room is enforced by the coordinator, which always
/// removes a connection from its old room before inserting it into a new one.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: HashMap<RoomName, HashSet<ConnId>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room, creating the room on first join
    ///
    /// Returns false if the connection was already a member.
    pub fn insert(&mut self, room: &RoomName, id: ConnId) -> bool {
        self.rooms.entry(room.clone()).or_default().insert(id)
    }

    /// Remove a connection from a room, dropping the room if it empties
    ///
    /// Returns false if the room or the membership did not exist.
    pub fn remove(&mut self, room: &RoomName, id: ConnId) -> bool {
        let Some(members) = self.rooms.get_mut(room) else {
            return false;
        };
        let removed = members.remove(&id);
        if members.is_empty() {
            self.rooms.remove(room);
        }
        removed
    }

    /// Membership count of a room, zero if it does not exist
    pub fn count(&self, room: &RoomName) -> usize {
        self.rooms.get(room).map_or(0, HashSet::len)
    }

    /// Snapshot of a room's members
    pub fn members(&self, room: &RoomName) -> Vec<ConnId> {
        self.rooms
            .get(room)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of live rooms
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
