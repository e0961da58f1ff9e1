//! WebSocket connection handler

use super::state::ShareState;
use super::utils::to_ws_message;
use crate::error::SignalError;
use crate::protocol::ServerMessage;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Handle one realtime connection until the peer goes away.
///
/// Inbound events are processed in order on this task; a separate writer
/// task drains the connection's outbound queue and keeps it alive with pings.
pub async fn handle_socket(socket: WebSocket, state: Arc<ShareState>, client_ip: String) {
    let (mut sender, mut receiver) = socket.split();

    let Some(_slot) = state.try_acquire_slot() else {
        tracing::warn!(
            "Rejecting WebSocket from {}: Too many concurrent connections",
            client_ip
        );
        let refusal = ServerMessage::Error {
            kind: "connection_limit".to_string(),
            message: "Too many concurrent connections".to_string(),
        };
        if let Some(frame) = to_ws_message(&refusal) {
            let _ = sender.send(frame).await;
        }
        let _ = sender.send(Message::Close(None)).await;
        return;
    };

    let hub = state.hub.clone();
    let (connection_id, outbox) = hub.connect().await;
    tracing::info!(
        "WebSocket connection established from: {} as {}",
        client_ip,
        connection_id
    );

    let writer = tokio::spawn(write_outbox(sender, outbox, state.ping_interval));

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => hub.dispatch_text(&connection_id, text.as_str()).await,
            Ok(Message::Binary(_)) => {
                let err = SignalError::malformed("binary frames are not supported");
                let _ = hub
                    .relay
                    .forward(&connection_id, ServerMessage::from(&err))
                    .await;
            }
            Ok(Message::Close(_)) => {
                tracing::info!("Client {} closed WebSocket connection", connection_id);
                break;
            }
            Ok(Message::Pong(_)) => {
                tracing::trace!("Received pong from {}", connection_id);
            }
            Ok(Message::Ping(_)) => {}
            Err(e) => {
                tracing::error!("WebSocket error on {}: {}", connection_id, e);
                break;
            }
        }
    }

    // Detaching the outbox ends the writer once it has flushed
    hub.disconnect(&connection_id).await;
    let _ = writer.await;
}

async fn write_outbox(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbox: mpsc::Receiver<ServerMessage>,
    ping_every: Duration,
) {
    let mut ping_interval = tokio::time::interval(ping_every);
    ping_interval.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            queued = outbox.recv() => {
                let Some(message) = queued else { break };
                let Some(frame) = to_ws_message(&message) else { continue };
                if let Err(e) = sender.send(frame).await {
                    tracing::error!("Failed to send message: {}", e);
                    break;
                }
            }
            _ = ping_interval.tick() => {
                tracing::trace!("Sending WebSocket ping");
                if let Err(e) = sender.send(Message::Ping(Bytes::new())).await {
                    tracing::error!("Failed to send ping: {}", e);
                    break;
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}
