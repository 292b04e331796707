//! Shared data models for the mangahub REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Identity ---

/// Public view of a user account, as returned by auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub email: String,
}

// --- Auth Request/Response Types ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Issued on successful login or registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user: UserSummary,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}

// --- Library ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LibraryStatus {
    Reading,
    Completed,
    WishList,
    Blacklist,
}

impl LibraryStatus {
    /// Accepts the spellings clients have historically sent.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "reading" => Some(Self::Reading),
            "completed" => Some(Self::Completed),
            "wish list" | "wish_list" | "wishlist" => Some(Self::WishList),
            "blacklist" | "black_list" | "black list" => Some(Self::Blacklist),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reading => "reading",
            Self::Completed => "completed",
            Self::WishList => "wish_list",
            Self::Blacklist => "blacklist",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryUpsertRequest {
    /// Required for `POST /api/library`; the path wins for `PUT`.
    #[serde(default)]
    pub manga_id: Option<String>,
    #[serde(default)]
    pub current_chapter: u32,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibraryEntry {
    pub user_id: String,
    pub manga_id: String,
    pub current_chapter: u32,
    pub status: LibraryStatus,
    pub updated_at: DateTime<Utc>,
}

/// Query for `GET /api/library`. Numbers arrive as text so a malformed
/// value can fall back to its default instead of failing the request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryListQuery {
    pub status: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibraryListResponse {
    pub items: Vec<LibraryEntry>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChapterRequest {
    pub manga_id: String,
    pub chapter: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewChapterResponse {
    pub recipients: usize,
}

// --- Health ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadinessReport {
    pub status: String,
    pub store: String,
    pub tcp_clients: usize,
    pub ws_clients: usize,
    pub chat_rooms: usize,
    pub notify_clients: usize,
}
