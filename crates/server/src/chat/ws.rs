//! Chat WebSocket endpoint and history route.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
    Json,
};
use futures_util::StreamExt;
use mangahub_shared::{ChatMessage, IncomingChatFrame};
use serde::Deserialize;

use crate::connection::{Connection, ConnectionHandle, WsConnection};
use crate::error::ApiError;
use crate::state::AppState;

const ANONYMOUS: &str = "anon";

#[derive(Debug, Deserialize)]
pub struct ChatParams {
    pub room: Option<String>,
    pub user: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub room: Option<String>,
}

fn required_room(room: Option<&str>) -> Result<String, ApiError> {
    let room = room.map(str::trim).unwrap_or_default();
    if room.is_empty() {
        return Err(ApiError::BadRequest("room is required".to_string()));
    }
    Ok(room.to_string())
}

/// `GET /api/chat/history?room=`
pub async fn chat_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let room = required_room(params.room.as_deref())?;
    Ok(Json(state.chat_hub.history(&room).await))
}

/// `GET /api/ws/chat?room=&user=`
pub async fn chat_ws_handler(
    State(state): State<AppState>,
    Query(params): Query<ChatParams>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let room = required_room(params.room.as_deref())?;
    let user = params
        .user
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(ANONYMOUS)
        .to_string();

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, room, user, state)))
}

async fn handle_socket(socket: WebSocket, room: String, user: String, state: AppState) {
    let (sender, mut receiver) = socket.split();
    let conn = Arc::new(WsConnection::new(sender, state.write_timeout));
    let handle: ConnectionHandle = conn.clone();
    let id = conn.id();

    let history = state.chat_hub.join(&room, handle, &user).await;
    for message in &history {
        let sent = match serde_json::to_vec(message) {
            Ok(payload) => conn.send(&payload).await,
            Err(e) => {
                tracing::error!("failed to serialize chat history: {}", e);
                continue;
            }
        };
        if let Err(e) = sent {
            tracing::debug!(%id, "[chat] history replay failed: {}", e);
            break;
        }
    }

    loop {
        let frame = tokio::select! {
            msg = receiver.next() => msg,
            _ = conn.closed() => break,
        };

        let raw = match frame {
            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
            Some(Ok(Message::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::debug!(%id, "[chat] receive error: {}", e);
                break;
            }
        };

        let Some((sender_name, text)) = interpret_frame(&raw) else {
            continue;
        };
        let author = match sender_name {
            Some(name) => name,
            None => state
                .chat_hub
                .user(&room, id)
                .await
                .unwrap_or_else(|| user.clone()),
        };

        state
            .chat_hub
            .broadcast(ChatMessage::message(room.as_str(), author, text))
            .await;
    }

    state.chat_hub.leave(&room, id).await;
}

/// Splits an inbound frame into an optional explicit author and its text.
///
/// Structured `{text, user?}` frames are preferred; anything that does not
/// parse is taken verbatim as chat text. Blank text yields `None`.
pub(crate) fn interpret_frame(raw: &str) -> Option<(Option<String>, String)> {
    match serde_json::from_str::<IncomingChatFrame>(raw) {
        Ok(frame) => {
            let text = frame.text.trim();
            if text.is_empty() {
                return None;
            }
            let user = frame
                .user
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty());
            Some((user, text.to_string()))
        }
        Err(_) => {
            let text = raw.trim();
            if text.is_empty() {
                None
            } else {
                Some((None, text.to_string()))
            }
        }
    }
}
