//! Live-event wire formats: library sync, room chat and UDP notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{LibraryEntry, LibraryStatus};

pub const NOTIFY_REGISTER: &str = "register";
pub const NOTIFY_UNREGISTER: &str = "unregister";
pub const NOTIFY_NEW_CHAPTER: &str = "new_chapter";

/// Failure to decode an inbound live-transport payload.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing required fields")]
    MissingFields,
}

// --- Library sync ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LibraryEventKind {
    #[serde(rename = "library.update")]
    Update,
    #[serde(rename = "library.delete")]
    Delete,
}

/// Pushed to every sync subscriber after a successful library mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibraryEvent {
    #[serde(rename = "type")]
    pub kind: LibraryEventKind,
    pub user_id: String,
    pub manga_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_chapter: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LibraryStatus>,
    pub at: DateTime<Utc>,
}

impl LibraryEvent {
    pub fn updated(entry: &LibraryEntry) -> Self {
        Self {
            kind: LibraryEventKind::Update,
            user_id: entry.user_id.clone(),
            manga_id: entry.manga_id.clone(),
            current_chapter: Some(entry.current_chapter),
            status: Some(entry.status),
            at: Utc::now(),
        }
    }

    pub fn deleted(user_id: impl Into<String>, manga_id: impl Into<String>) -> Self {
        Self {
            kind: LibraryEventKind::Delete,
            user_id: user_id.into(),
            manga_id: manga_id.into(),
            current_chapter: None,
            status: None,
            at: Utc::now(),
        }
    }
}

/// First line written to a newly accepted TCP sync client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncWelcome {
    #[serde(rename = "type")]
    pub r#type: String,
    pub message: String,
    pub clients: usize,
}

impl SyncWelcome {
    pub fn new(clients: usize) -> Self {
        Self {
            r#type: "welcome".to_string(),
            message: "connected".to_string(),
            clients,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncStats {
    pub tcp_clients: usize,
    pub ws_clients: usize,
}

// --- Chat ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatEventKind {
    Message,
    UserJoin,
    UserLeave,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    #[serde(rename = "type")]
    pub kind: ChatEventKind,
    pub room: String,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn message(room: impl Into<String>, user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: ChatEventKind::Message,
            room: room.into(),
            user: user.into(),
            text: Some(text.into()),
            at: Utc::now(),
        }
    }

    pub fn joined(room: impl Into<String>, user: impl Into<String>) -> Self {
        Self::presence(ChatEventKind::UserJoin, room.into(), user.into())
    }

    pub fn left(room: impl Into<String>, user: impl Into<String>) -> Self {
        Self::presence(ChatEventKind::UserLeave, room.into(), user.into())
    }

    fn presence(kind: ChatEventKind, room: String, user: String) -> Self {
        Self {
            kind,
            room,
            user,
            text: None,
            at: Utc::now(),
        }
    }
}

/// Structured client frame on the chat socket.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncomingChatFrame {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

// --- UDP notifications ---

#[derive(Deserialize)]
struct RawNotifyRequest {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    user_id: String,
}

/// A datagram received on the notify listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyRequest {
    Register { user_id: String },
    Unregister { user_id: String },
    Unknown { kind: String },
}

impl NotifyRequest {
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        let raw: RawNotifyRequest = serde_json::from_slice(data)?;
        let kind = raw.kind.trim();
        let user_id = raw.user_id.trim();
        if kind.is_empty() || user_id.is_empty() {
            return Err(ProtocolError::MissingFields);
        }

        Ok(match kind {
            NOTIFY_REGISTER => Self::Register {
                user_id: user_id.to_string(),
            },
            NOTIFY_UNREGISTER => Self::Unregister {
                user_id: user_id.to_string(),
            },
            other => Self::Unknown {
                kind: other.to_string(),
            },
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewChapterNotice {
    #[serde(rename = "type")]
    pub r#type: String,
    pub manga_id: String,
    pub chapter: u32,
}

impl NewChapterNotice {
    pub fn new(manga_id: impl Into<String>, chapter: u32) -> Self {
        Self {
            r#type: NOTIFY_NEW_CHAPTER.to_string(),
            manga_id: manga_id.into(),
            chapter,
        }
    }
}
