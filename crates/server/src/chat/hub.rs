//! Room-partitioned chat with bounded history.

use std::collections::{HashMap, VecDeque};

use mangahub_shared::{ChatEventKind, ChatMessage};
use tokio::sync::Mutex;

use crate::connection::{Connection, ConnectionHandle, ConnectionId};

pub const DEFAULT_HISTORY_SIZE: usize = 50;

struct Member {
    conn: ConnectionHandle,
    user: String,
}

#[derive(Default)]
struct Room {
    members: HashMap<ConnectionId, Member>,
    /// Only `message` events; presence is never stored.
    history: VecDeque<ChatMessage>,
}

pub struct ChatHub {
    rooms: Mutex<HashMap<String, Room>>,
    history_size: usize,
}

impl Default for ChatHub {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

impl ChatHub {
    /// A zero `history_size` falls back to [`DEFAULT_HISTORY_SIZE`].
    pub fn new(history_size: usize) -> Self {
        let history_size = if history_size == 0 {
            DEFAULT_HISTORY_SIZE
        } else {
            history_size
        };
        Self {
            rooms: Mutex::new(HashMap::new()),
            history_size,
        }
    }

    pub fn history_size(&self) -> usize {
        self.history_size
    }

    /// Adds `conn` to `room` (creating it on first use) and returns a copy of
    /// the room history for the caller to replay without holding the lock.
    pub async fn join(&self, room: &str, conn: ConnectionHandle, user: &str) -> Vec<ChatMessage> {
        let history = {
            let mut rooms = self.rooms.lock().await;
            let entry = rooms.entry(room.to_string()).or_default();
            entry.members.insert(
                conn.id(),
                Member {
                    conn,
                    user: user.to_string(),
                },
            );
            entry.history.iter().cloned().collect()
        };

        tracing::info!("[chat] {} joined {}", user, room);
        self.broadcast(ChatMessage::joined(room, user)).await;
        history
    }

    /// Removes and closes the connection, announcing the departure if it was a member.
    pub async fn leave(&self, room: &str, id: ConnectionId) {
        let member = {
            let mut rooms = self.rooms.lock().await;
            rooms
                .get_mut(room)
                .and_then(|entry| entry.members.remove(&id))
        };

        let Some(member) = member else {
            return;
        };
        let _ = member.conn.close().await;

        tracing::info!("[chat] {} left {}", member.user, room);
        if !member.user.is_empty() {
            self.broadcast(ChatMessage::left(room, member.user)).await;
        }
    }

    /// Records `message` events in history, then delivers to every member of
    /// the room. Messages for a room nobody has ever joined are dropped.
    pub async fn broadcast(&self, message: ChatMessage) {
        let payload = match serde_json::to_vec(&message) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("failed to serialize chat message: {}", e);
                return;
            }
        };

        let mut rooms = self.rooms.lock().await;
        let Some(room) = rooms.get_mut(&message.room) else {
            tracing::debug!("[chat] dropping message for unknown room {}", message.room);
            return;
        };

        let room_name = message.room.clone();
        if message.kind == ChatEventKind::Message {
            room.history.push_back(message);
            while room.history.len() > self.history_size {
                room.history.pop_front();
            }
        }

        let targets: Vec<(ConnectionId, ConnectionHandle)> = room
            .members
            .iter()
            .map(|(id, member)| (*id, member.conn.clone()))
            .collect();

        let mut dead = Vec::new();
        for (id, conn) in targets {
            if let Err(e) = conn.send(&payload).await {
                tracing::warn!(%id, "[chat] dropping member of {}: {}", room_name, e);
                dead.push(conn);
            }
        }

        for conn in &dead {
            room.members.remove(&conn.id());
        }
        drop(rooms);

        for conn in dead {
            let _ = conn.close().await;
        }
    }

    /// Oldest first; empty for rooms that were never joined.
    pub async fn history(&self, room: &str) -> Vec<ChatMessage> {
        self.rooms
            .lock()
            .await
            .get(room)
            .map(|entry| entry.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Display name registered for `id` in `room`.
    pub async fn user(&self, room: &str, id: ConnectionId) -> Option<String> {
        self.rooms
            .lock()
            .await
            .get(room)
            .and_then(|entry| entry.members.get(&id))
            .map(|member| member.user.clone())
    }

    pub async fn member_count(&self, room: &str) -> usize {
        self.rooms
            .lock()
            .await
            .get(room)
            .map_or(0, |entry| entry.members.len())
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}
