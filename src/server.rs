//! RelayServer Actor implementation
//!
//! The central actor that owns all shared state: the connection registry, the
//! room directory and the stranger waiting pool. Uses the Actor pattern with
//! mpsc channels for message passing, so every inbound event is applied as one
//! atomic step — multi-step sequences (leave-old/join-new, pop/verify/bind)
//! can never interleave with another connection's mutation.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::connection::{Connection, ConnectionRegistry};
use crate::history::{HistoryStore, BACKLOG_LIMIT};
use crate::message::{RoomMessage, ServerEvent, StrangerMessage};
use crate::pairing::PairingPool;
use crate::room::RoomDirectory;
use crate::types::{ConnId, RoomName};

/// Commands sent from handlers to the RelayServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New authenticated connection
    Connect {
        conn_id: ConnId,
        username: String,
        sender: mpsc::Sender<ServerEvent>,
    },
    /// Transport closed; run full cleanup
    Disconnect {
        conn_id: ConnId,
    },
    /// Join a named room
    Join {
        conn_id: ConnId,
        room: String,
    },
    /// Send a message to the current room
    Chat {
        conn_id: ConnId,
        text: String,
    },
    /// Typing state change in the current room
    Typing {
        conn_id: ConnId,
        is_typing: bool,
    },
    /// Request a stranger pairing
    FindStranger {
        conn_id: ConnId,
    },
    /// Send a message over the current pairing
    StrangerMessage {
        conn_id: ConnId,
        text: String,
    },
    /// Leave the waiting pool or the current pairing
    LeaveStranger {
        conn_id: ConnId,
    },
}

/// The main RelayServer actor
///
/// Owns the registry, room directory, waiting pool and the history
/// collaborator; processes commands from connection handlers one at a time.
pub struct RelayServer {
    /// All live connections and their per-connection state
    registry: ConnectionRegistry,
    /// Room name -> member set
    rooms: RoomDirectory,
    /// Connections waiting for a stranger pairing
    pool: PairingPool,
    /// History collaborator for room backlog and persistence
    history: Box<dyn HistoryStore + Send + Sync>,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl RelayServer {
    /// Create a new RelayServer with the given command receiver and history store
    pub fn new(receiver: mpsc::Receiver<ServerCommand>, history: Box<dyn HistoryStore + Send + Sync>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            rooms: RoomDirectory::new(),
            pool: PairingPool::new(),
            history,
            receiver,
        }
    }

    /// Run the RelayServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("RelayServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        info!("RelayServer shutting down");
    }

    /// Process a single command
    async fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect { conn_id, username, sender } => {
                self.handle_connect(conn_id, username, sender);
            }
            ServerCommand::Disconnect { conn_id } => {
                self.cleanup_connection(conn_id).await;
            }
            ServerCommand::Join { conn_id, room } => {
                self.handle_join(conn_id, room).await;
            }
            ServerCommand::Chat { conn_id, text } => {
                self.handle_chat(conn_id, text).await;
            }
            ServerCommand::Typing { conn_id, is_typing } => {
                self.handle_typing(conn_id, is_typing).await;
            }
            ServerCommand::FindStranger { conn_id } => {
                self.handle_find_stranger(conn_id).await;
            }
            ServerCommand::StrangerMessage { conn_id, text } => {
                self.handle_stranger_message(conn_id, text).await;
            }
            ServerCommand::LeaveStranger { conn_id } => {
                self.handle_leave_stranger(conn_id).await;
            }
        }
    }

    /// Handle new authenticated connection
    ///
    /// The username was resolved by the identity check before this command was
    /// issued; unauthorized connections never reach the registry.
    fn handle_connect(&mut self, conn_id: ConnId, username: String, sender: mpsc::Sender<ServerEvent>) {
        info!("Connection {} registered as '{}'", conn_id, username);
        self.registry.register(Connection::new(conn_id, username, sender));
        debug!(
            "Total connections: {}, rooms: {}, waiting: {}",
            self.registry.len(),
            self.rooms.room_count(),
            self.pool.len()
        );
    }

    /// Handle room joining, switching rooms if needed
    async fn handle_join(&mut self, conn_id: ConnId, room: String) {
        let Some(conn) = self.registry.get(conn_id) else {
            return;
        };

        let room = RoomName::normalize(&room);

        // Rejoining the current room is a no-op
        if conn.room.as_ref() == Some(&room) {
            return;
        }

        let username = conn.username.clone();
        let old_room = conn.room.clone();

        // One room at a time: leave the old room before entering the new one
        if let Some(old_room) = old_room {
            self.leave_room(conn_id, &old_room).await;
        }

        self.rooms.insert(&room, conn_id);
        if let Some(conn) = self.registry.get_mut(conn_id) {
            conn.room = Some(room.clone());
        }

        info!("'{}' ({}) joined room '{}'", username, conn_id, room);

        // Joiner gets the backlog first, then the personalized welcome
        let backlog = self.history.recent(&room, BACKLOG_LIMIT);
        self.registry
            .send_to(conn_id, ServerEvent::History { messages: backlog })
            .await;
        self.registry
            .send_to(
                conn_id,
                ServerEvent::SystemMessage {
                    text: format!("Welcome to '{}', {}!", room, username),
                },
            )
            .await;

        // Everyone else gets the join notice; everyone gets the new count
        self.registry
            .broadcast(
                self.rooms.members(&room),
                ServerEvent::SystemMessage {
                    text: format!("{} joined the room", username),
                },
                Some(conn_id),
            )
            .await;
        self.broadcast_presence(&room).await;
    }

    /// Remove a connection from a room and notify the remaining members
    ///
    /// Reached from room switching and from disconnect cleanup; leaving a room
    /// the connection is not in is a no-op.
    async fn leave_room(&mut self, conn_id: ConnId, room: &RoomName) {
        let Some(conn) = self.registry.get_mut(conn_id) else {
            return;
        };
        if conn.room.as_ref() != Some(room) {
            return;
        }
        conn.room = None;
        let username = conn.username.clone();

        if !self.rooms.remove(room, conn_id) {
            return;
        }
        if self.rooms.count(room) == 0 {
            debug!("Room '{}' deleted (empty)", room);
        }

        info!("'{}' ({}) left room '{}'", username, conn_id, room);

        self.registry
            .broadcast(
                self.rooms.members(room),
                ServerEvent::SystemMessage {
                    text: format!("{} left the room", username),
                },
                None,
            )
            .await;
        self.broadcast_presence(room).await;
    }

    /// Handle room chat message
    async fn handle_chat(&mut self, conn_id: ConnId, text: String) {
        let Some(conn) = self.registry.get(conn_id) else {
            return;
        };
        // Not in a room: drop the message
        let Some(room) = conn.room.clone() else {
            return;
        };

        let record = RoomMessage::new(&conn.username, room.as_str(), &text);

        // Persist first, then fan out to every member including the sender,
        // so the sender sees the server-assigned id and timestamp
        self.history.append(&room, record.clone());
        self.registry
            .broadcast(self.rooms.members(&room), ServerEvent::ChatMessage(record), None)
            .await;
    }

    /// Handle typing state change, transient and never persisted
    async fn handle_typing(&mut self, conn_id: ConnId, is_typing: bool) {
        let Some(conn) = self.registry.get(conn_id) else {
            return;
        };
        let Some(room) = conn.room.clone() else {
            return;
        };
        let username = conn.username.clone();

        self.registry
            .broadcast(
                self.rooms.members(&room),
                ServerEvent::Typing { username, is_typing },
                Some(conn_id),
            )
            .await;
    }

    /// Handle a stranger pairing request
    async fn handle_find_stranger(&mut self, conn_id: ConnId) {
        if !self.registry.contains(conn_id) {
            return;
        }

        // A connection may not hold two pairing links: tear down the old one first
        self.teardown_pairing(conn_id).await;

        // Keep at most one pool entry per connection; also prevents a repeat
        // request from popping the requester itself
        self.pool.remove(conn_id);

        match self.pool.pop() {
            Some(candidate) if self.registry.contains(candidate) => {
                if let Some(conn) = self.registry.get_mut(conn_id) {
                    conn.partner = Some(candidate);
                }
                if let Some(partner) = self.registry.get_mut(candidate) {
                    partner.partner = Some(conn_id);
                }

                info!("Paired {} with {}", conn_id, candidate);

                self.registry.send_to(conn_id, ServerEvent::StrangerFound).await;
                self.registry.send_to(candidate, ServerEvent::StrangerFound).await;
            }
            candidate => {
                // A popped id that no longer resolves was a stale entry; drop
                // it and queue the requester instead of retrying further
                if let Some(stale) = candidate {
                    debug!("Discarded stale pool candidate {}", stale);
                }
                self.pool.enqueue(conn_id);
                self.registry.send_to(conn_id, ServerEvent::WaitingStranger).await;
            }
        }
    }

    /// Handle a message over the current pairing
    async fn handle_stranger_message(&mut self, conn_id: ConnId, text: String) {
        let Some((partner, username)) = self
            .registry
            .get(conn_id)
            .map(|c| (c.partner, c.username.clone()))
        else {
            return;
        };
        // Not paired: drop the message
        let Some(partner_id) = partner else {
            return;
        };

        // Teardown normally clears both ends before the partner's connection
        // goes away; this guards the ordering race where it has not run yet
        if !self.registry.contains(partner_id) {
            if let Some(conn) = self.registry.get_mut(conn_id) {
                conn.partner = None;
            }
            self.registry.send_to(conn_id, ServerEvent::StrangerLeft).await;
            return;
        }

        // Anonymous history is not retained; deliver to both ends only
        let message = StrangerMessage::new(&username, &text);
        self.registry
            .send_to(conn_id, ServerEvent::StrangerMessage(message.clone()))
            .await;
        self.registry
            .send_to(partner_id, ServerEvent::StrangerMessage(message))
            .await;
    }

    /// Handle leaving the waiting pool or the current pairing
    async fn handle_leave_stranger(&mut self, conn_id: ConnId) {
        // Still waiting: just dequeue and confirm
        if self.pool.remove(conn_id) {
            self.registry.send_to(conn_id, ServerEvent::YouDisconnected).await;
            return;
        }

        self.teardown_pairing(conn_id).await;
    }

    /// Tear down a pairing link from the initiator's side
    ///
    /// Triggered by explicit leave, by a fresh pairing request, and by
    /// disconnect cleanup. Idempotent: without an active link this is a no-op.
    async fn teardown_pairing(&mut self, initiator: ConnId) {
        let Some(partner_id) = self.registry.get(initiator).and_then(|c| c.partner) else {
            return;
        };

        self.registry.send_to(initiator, ServerEvent::YouDisconnected).await;

        // The partner may already be gone; its link state dies with it
        if self.registry.contains(partner_id) {
            self.registry.send_to(partner_id, ServerEvent::StrangerLeft).await;
            if let Some(partner) = self.registry.get_mut(partner_id) {
                partner.partner = None;
            }
        }

        if let Some(conn) = self.registry.get_mut(initiator) {
            conn.partner = None;
        }

        info!("Pairing {} <-> {} torn down", initiator, partner_id);
    }

    /// Full cleanup for a closed connection, exactly once
    ///
    /// Single entry point shared by the transport disconnect path and any
    /// explicit leave racing with it; a connection no longer in the registry
    /// has already been cleaned up, so a second invocation is a no-op.
    async fn cleanup_connection(&mut self, conn_id: ConnId) {
        let Some(conn) = self.registry.get(conn_id) else {
            return;
        };
        let room = conn.room.clone();

        // Implicit leave for the current room
        if let Some(room) = room {
            self.leave_room(conn_id, &room).await;
        }

        // Waiting pool removal is silent; nobody observes a waiting stranger
        self.pool.remove(conn_id);

        // Active pairing: the partner is notified, the initiator's own
        // notification lands on a closed channel and is dropped
        self.teardown_pairing(conn_id).await;

        self.registry.unregister(conn_id);

        info!("Connection {} cleaned up", conn_id);
        debug!(
            "Total connections: {}, rooms: {}, waiting: {}",
            self.registry.len(),
            self.rooms.room_count(),
            self.pool.len()
        );
    }

    /// Send the current membership count to every member of a room
    async fn broadcast_presence(&self, room: &RoomName) {
        let event = ServerEvent::Presence {
            room: room.to_string(),
            count: self.rooms.count(room),
        };
        self.registry
            .broadcast(self.rooms.members(room), event, None)
            .await;
    }
}
