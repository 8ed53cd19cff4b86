//! Manages the WebSocket connection lifecycle for one relayed device.

use super::connection::{WsFrameReader, WsFrameWriter};
use crate::state::AppState;
use axum::{
    extract::{
        State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{error, info, instrument};
use voicelink_core::{RelayError, RelaySession, SessionOutcome, ports::ClientWriter};

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Runs one relay session for an upgraded connection.
///
/// The session is governed by a child of the process shutdown token, so a
/// server shutdown tears down every live session through the normal path.
#[instrument(name = "relay_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id: u32 = rand::random();
    tracing::Span::current().record("session_id", session_id);
    info!("New WebSocket connection.");

    let (sink, stream) = socket.split();
    let mut session = RelaySession::new(
        Box::new(WsFrameReader::new(stream)),
        ClientWriter::new(WsFrameWriter::new(sink)),
        state.remote_factory.clone(),
        state.relay_settings.clone(),
    );

    let result = session
        .run(state.shutdown.child_token())
        .await
        .and_then(SessionOutcome::into_result);
    match result {
        Ok(()) => {}
        Err(RelayError::Cancelled) => info!("Session cancelled."),
        Err(e @ RelayError::TransportRead { expected: true, .. }) => {
            info!(reason = %e, "Client disconnected.")
        }
        Err(e) => error!(error = %e, "Client handling error"),
    }
}
