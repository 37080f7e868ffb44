//! Multi-Room WebSocket Chat Relay Library
//!
//! A real-time messaging relay built with tokio-tungstenite using the Actor
//! pattern for state management. Supports two modes over one connection:
//! named-room group chat and anonymous one-to-one stranger pairing.
//!
//! # Features
//! - WebSocket connection handling with accept-time identity checks
//! - Named rooms, created on first join and dropped when empty
//! - Room presence counts and join-time message backlog
//! - Real-time chat messaging with server-assigned ids and timestamps
//! - Typing indicators
//! - FIFO stranger matchmaking with symmetric pairing links
//! - Idempotent disconnect cleanup shared by all teardown paths
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `RelayServer` is the central actor managing all state
//! - Each connection has a `handler` task communicating with the server
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use chat_relay::{handle_connection, MemoryHistory, QueryIdentity, RelayServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!     let identity = Arc::new(QueryIdentity);
//!
//!     tokio::spawn(RelayServer::new(cmd_rx, Box::new(MemoryHistory::new())).run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         let cmd_tx = cmd_tx.clone();
//!         let identity = identity.clone();
//!         tokio::spawn(handle_connection(stream, cmd_tx, identity));
//!     }
//! }
//! ```

pub mod connection;
pub mod error;
pub mod handler;
pub mod history;
pub mod identity;
pub mod message;
pub mod pairing;
pub mod room;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use connection::{Connection, ConnectionRegistry};
pub use error::{AppError, SendError};
pub use handler::handle_connection;
pub use history::{HistoryStore, MemoryHistory};
pub use identity::{IdentityProvider, QueryIdentity};
pub use message::{ClientEvent, RoomMessage, ServerEvent, StrangerMessage};
pub use pairing::PairingPool;
pub use room::RoomDirectory;
pub use server::{RelayServer, ServerCommand};
pub use types::{ConnId, RoomName};
