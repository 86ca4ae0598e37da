//! Manages the WebSocket connection lifecycle for a tutoring session.
//!
//! The socket is split in two: a writer task drains [`ServerMessage`]s onto
//! the wire, and the read loop below parses frames into [`ClientMessage`]s
//! for the shell. The shell never touches the socket directly.

use super::{
    protocol::{ClientMessage, ServerMessage},
    shell::{ShellSettings, run_shell},
};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, instrument, warn};

/// Bound on client messages waiting for the shell.
const INBOUND_BUFFER: usize = 32;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
#[utoipa::path(
    get,
    path = "/ws",
    responses(
        (status = 101, description = "Switching protocols to a tutoring session")
    )
)]
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
#[instrument(name = "ws_session", skip_all, fields(connection_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id: u32 = rand::random();
    tracing::Span::current().record("connection_id", connection_id);
    info!("New WebSocket connection. Awaiting start...");

    let (mut socket_tx, mut socket_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let (inbound_tx, inbound_rx) = mpsc::channel::<ClientMessage>(INBOUND_BUFFER);

    let writer = tokio::spawn(
        async move {
            while let Some(message) = outbound_rx.recv().await {
                if let Err(e) = send_msg(&mut socket_tx, message).await {
                    warn!(error = ?e, "Failed to write to client. Closing writer.");
                    break;
                }
            }
            let _ = socket_tx.close().await;
        }
        .in_current_span(),
    );

    let settings = ShellSettings::from(state.config.as_ref());
    let shell_span = tracing::info_span!("session_runtime", connection_id);
    let shell = tokio::spawn(
        run_shell(state, settings, inbound_rx, outbound_tx.clone()).instrument(shell_span),
    );

    while let Some(frame) = socket_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(message) => {
                    if inbound_tx.send(message).await.is_err() {
                        warn!("Session runtime stopped. Closing connection.");
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Malformed client message");
                    let _ = outbound_tx.send(ServerMessage::Error {
                        message: format!("malformed message: {e}"),
                    });
                }
            },
            Ok(Message::Binary(_)) => {
                debug!("Ignoring binary frame; the protocol is JSON text only.");
            }
            Ok(Message::Close(_)) => {
                info!("Client sent close frame. Shutting down session.");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                error!("Error receiving from client WebSocket: {:?}", e);
                break;
            }
        }
    }

    // Closing the inbound channel stops the shell, which drops the last
    // outbound senders and lets the writer drain.
    drop(inbound_tx);
    drop(outbound_tx);
    match shell.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = ?e, "Session runtime terminated with error."),
        Err(e) => error!(error = ?e, "Session runtime panicked."),
    }
    if let Err(e) = writer.await {
        error!(error = ?e, "Writer task failed.");
    }
    info!("WebSocket connection closed and session terminated.");
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
