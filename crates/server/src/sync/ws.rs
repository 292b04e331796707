//! WebSocket subscription to library sync events.

use std::sync::Arc;

use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    response::Response,
};
use futures_util::StreamExt;

use crate::connection::{Connection, ConnectionHandle, WsConnection};
use crate::state::AppState;

/// Upgrade handler for `GET /api/ws/sync`.
pub async fn sync_ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, mut receiver) = socket.split();
    let conn = Arc::new(WsConnection::new(sender, state.write_timeout));
    let handle: ConnectionHandle = conn.clone();
    let id = conn.id();

    state.sync_hub.register(handle).await;
    tracing::info!(%id, "[ws-sync] client connected");

    // Subscribers never talk back; the loop only watches for disconnects.
    loop {
        tokio::select! {
            msg = receiver.next() => match msg {
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::debug!(%id, "[ws-sync] receive error: {}", e);
                    break;
                }
                None => break,
            },
            _ = conn.closed() => break,
        }
    }

    state.sync_hub.unregister(id).await;
    tracing::info!(%id, "[ws-sync] client disconnected");
}
