//! Connection state and registry
//!
//! A [`Connection`] owns the per-connection mutable state (current room,
//! current pairing partner) and the outbound event channel. The
//! [`ConnectionRegistry`] maps live connection ids to their state and carries
//! the delivery primitives used for event fan-out.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::ServerEvent;
use crate::types::{ConnId, RoomName};

/// One live bidirectional session
///
/// The username is assigned once at connection-accept time and immutable
/// thereafter. Other components reference a connection by [`ConnId`] only;
/// the registry is the sole owner of this struct.
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: ConnId,
    /// Authenticated identity, fixed at accept time
    pub username: String,
    /// Current room, at most one at a time
    pub room: Option<RoomName>,
    /// Current pairing partner, at most one at a time
    pub partner: Option<ConnId>,
    /// Server → Client event channel
    sender: mpsc::Sender<ServerEvent>,
}

impl Connection {
    /// Create a new connection with the given id, identity and sender channel
    pub fn new(id: ConnId, username: String, sender: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            id,
            username,
            room: None,
            partner: None,
            sender,
        }
    }

    /// Send an event to this connection
    ///
    /// Returns an error if the channel is closed (connection disconnected).
    pub async fn send(&self, event: ServerEvent) -> Result<(), SendError> {
        self.sender
            .send(event)
            .await
            .map_err(|_| SendError::ChannelClosed)
    }
}

/// Registry of all live connections
///
/// Maps connection ids to their state. Registration requires an
/// already-resolved identity — the unauthorized path never constructs a
/// [`Connection`], so anonymous entries cannot exist here.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an authenticated connection
    pub fn register(&mut self, conn: Connection) {
        self.connections.insert(conn.id, conn);
    }

    /// Look up a connection by id
    pub fn get(&self, id: ConnId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Look up a connection by id, mutably
    pub fn get_mut(&mut self, id: ConnId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    /// Whether the id resolves to a live connection
    pub fn contains(&self, id: ConnId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Remove a connection, returning its final state if it was present
    pub fn unregister(&mut self, id: ConnId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    /// Number of live connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Deliver an event to one connection, best-effort
    ///
    /// A stale id or a closed channel drops the event silently.
    pub async fn send_to(&self, id: ConnId, event: ServerEvent) {
        if let Some(conn) = self.connections.get(&id) {
            let _ = conn.send(event).await;
        }
    }

    /// Deliver an event to a set of connections, optionally excluding one
    pub async fn broadcast<I>(&self, ids: I, event: ServerEvent, except: Option<ConnId>)
    where
        I: IntoIterator<Item = ConnId>,
    {
        for id in ids {
            if except == Some(id) {
                continue;
            }
            self.send_to(id, event.clone()).await;
        }
    }
}
