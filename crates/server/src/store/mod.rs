//! Persistence seam for users and library entries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mangahub_shared::{LibraryEntry, LibraryStatus, UserSummary};

mod aurora;
mod memory;

pub use aurora::AuroraStore;
pub use memory::MemoryStore;

/// A stored account. `token_version` starts at 0 and only ever increases by one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub token_version: u64,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("{0} already taken")]
    Conflict(&'static str),
    #[error("token version cannot be incremented further")]
    VersionOverflow,
    #[error("storage backend: {0}")]
    Backend(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] when the email or username is taken.
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;
    async fn get_token_version(&self, user_id: &str) -> Result<u64, StoreError>;
    /// Returns the new version.
    async fn bump_token_version(&self, user_id: &str) -> Result<u64, StoreError>;
    /// Replaces the password hash and bumps the version as one unit; on any
    /// error neither field changes. Returns the new version.
    async fn update_password_and_bump_version(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<u64, StoreError>;
    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait LibraryStore: Send + Sync {
    async fn upsert_entry(&self, entry: LibraryEntry) -> Result<LibraryEntry, StoreError>;
    async fn get_entry(&self, user_id: &str, manga_id: &str)
        -> Result<Option<LibraryEntry>, StoreError>;
    /// One page of a user's entries, newest first, plus the total number of
    /// entries that match `status`.
    async fn list_entries(
        &self,
        user_id: &str,
        status: Option<LibraryStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<LibraryEntry>, usize), StoreError>;
    /// Fails with [`StoreError::NotFound`] when there is nothing to delete.
    async fn delete_entry(&self, user_id: &str, manga_id: &str) -> Result<(), StoreError>;
}

/// Sorts newest first (ties by manga id) and cuts out one page.
pub(crate) fn paginate(
    mut entries: Vec<LibraryEntry>,
    limit: usize,
    offset: usize,
) -> (Vec<LibraryEntry>, usize) {
    entries.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.manga_id.cmp(&b.manga_id))
    });
    let total = entries.len();
    let page = entries.into_iter().skip(offset).take(limit).collect();
    (page, total)
}

pub(crate) fn next_version(current: u64) -> Result<u64, StoreError> {
    current.checked_add(1).ok_or(StoreError::VersionOverflow)
}
