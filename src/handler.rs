//! WebSocket connection handler
//!
//! Handles individual connections: WebSocket handshake, the accept-time
//! identity check, event parsing, and bidirectional communication with the
//! RelayServer.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::identity::IdentityProvider;
use crate::message::{ClientEvent, ServerEvent};
use crate::server::ServerCommand;
use crate::types::ConnId;

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, resolves the connection's identity, and
/// pumps events between the socket and the RelayServer. Connections without a
/// valid identity are rejected and closed before any state is created.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
    identity: Arc<dyn IdentityProvider>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake, capturing the request URI for the identity check
    let mut query: Option<String> = None;
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        query = req.uri().query().map(String::from);
        Ok(resp)
    };
    let mut ws_stream = tokio_tungstenite::accept_hdr_async(stream, callback).await?;

    // Unauthorized connections are told so and closed; they never reach the server
    let Some(username) = identity.authenticate(query.as_deref()) else {
        warn!("Rejected unauthorized connection from {}", peer_addr);
        let json = serde_json::to_string(&ServerEvent::Unauthorized)?;
        let _ = ws_stream.send(Message::Text(json.into())).await;
        let _ = ws_stream.close(None).await;
        return Ok(());
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Generate connection ID
    let conn_id = ConnId::new();
    info!("Connection {} ('{}') accepted from {}", conn_id, username, peer_addr);

    // Create channel for server -> client events
    let (event_tx, mut event_rx) = mpsc::channel::<ServerEvent>(32);

    // Register with RelayServer
    if cmd_tx
        .send(ServerCommand::Connect {
            conn_id,
            username,
            sender: event_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to register connection {} - server closed", conn_id);
        return Err(AppError::ChannelSend);
    }

    // Clone cmd_tx for read task
    let cmd_tx_read = cmd_tx.clone();

    // Spawn read task (WebSocket -> ServerCommand)
    let read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => {
                            let cmd = client_event_to_command(conn_id, event);
                            if cmd_tx_read.send(cmd).await.is_err() {
                                debug!("Server closed, ending read task for {}", conn_id);
                                break;
                            }
                        }
                        Err(e) => {
                            // Malformed frames are logged and skipped, never fatal
                            warn!("Invalid JSON from {}: {}", conn_id, e);
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("Connection {} sent close frame", conn_id);
                    break;
                }
                Ok(Message::Ping(data)) => {
                    debug!("Ping from {}", conn_id);
                    // Pong is handled automatically by tungstenite
                    let _ = data;
                }
                Ok(Message::Pong(_)) => {
                    debug!("Pong from {}", conn_id);
                }
                Ok(_) => {
                    // Binary or other message types - ignore
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", conn_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", conn_id);
    });

    // Spawn write task (ServerEvent -> WebSocket)
    let write_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize event: {}", e);
                    // Continue - don't break on serialization errors
                }
            }
        }
        debug!("Write task ended for connection");

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = read_task => {
            debug!("Read task completed for {}", conn_id);
        }
        _ = write_task => {
            debug!("Write task completed for {}", conn_id);
        }
    }

    // Send disconnect command; cleanup on the server side is idempotent
    let _ = cmd_tx.send(ServerCommand::Disconnect { conn_id }).await;

    info!("Connection {} disconnected", conn_id);

    Ok(())
}

/// Convert a ClientEvent to a ServerCommand
fn client_event_to_command(conn_id: ConnId, event: ClientEvent) -> ServerCommand {
    match event {
        ClientEvent::Join { room } => ServerCommand::Join { conn_id, room },
        ClientEvent::ChatMessage { text } => ServerCommand::Chat { conn_id, text },
        ClientEvent::Typing { is_typing } => ServerCommand::Typing { conn_id, is_typing },
        ClientEvent::FindStranger => ServerCommand::FindStranger { conn_id },
        ClientEvent::StrangerMessage { text } => ServerCommand::StrangerMessage { conn_id, text },
        ClientEvent::LeaveStranger => ServerCommand::LeaveStranger { conn_id },
    }
}
