//! In-process store for tests and `MANGAHUB_STORAGE=memory`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use mangahub_shared::{LibraryEntry, LibraryStatus};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{next_version, paginate, LibraryStore, NewUser, StoreError, User, UserStore};

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, User>>,
    library: RwLock<HashMap<(String, String), LibraryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    async fn force_token_version(&self, user_id: &str, version: u64) {
        if let Some(user) = self.users.write().await.get_mut(user_id) {
            user.token_version = version;
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::Conflict("email"));
        }
        if users.values().any(|u| u.username == new_user.username) {
            return Err(StoreError::Conflict("username"));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            token_version: 0,
            created_at: Utc::now(),
        };
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn get_token_version(&self, user_id: &str) -> Result<u64, StoreError> {
        self.users
            .read()
            .await
            .get(user_id)
            .map(|u| u.token_version)
            .ok_or(StoreError::NotFound)
    }

    async fn bump_token_version(&self, user_id: &str) -> Result<u64, StoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(user_id).ok_or(StoreError::NotFound)?;
        user.token_version = next_version(user.token_version)?;
        Ok(user.token_version)
    }

    async fn update_password_and_bump_version(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<u64, StoreError> {
        let mut users = self.users.write().await;
        let current = users.get(user_id).ok_or(StoreError::NotFound)?;

        // Stage on a copy; the map only sees a fully updated record.
        let mut staged = current.clone();
        staged.password_hash = password_hash.to_string();
        staged.token_version = next_version(staged.token_version)?;

        let version = staged.token_version;
        users.insert(user_id.to_string(), staged);
        Ok(version)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl LibraryStore for MemoryStore {
    async fn upsert_entry(&self, entry: LibraryEntry) -> Result<LibraryEntry, StoreError> {
        let key = (entry.user_id.clone(), entry.manga_id.clone());
        self.library.write().await.insert(key, entry.clone());
        Ok(entry)
    }

    async fn get_entry(
        &self,
        user_id: &str,
        manga_id: &str,
    ) -> Result<Option<LibraryEntry>, StoreError> {
        let key = (user_id.to_string(), manga_id.to_string());
        Ok(self.library.read().await.get(&key).cloned())
    }

    async fn list_entries(
        &self,
        user_id: &str,
        status: Option<LibraryStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<LibraryEntry>, usize), StoreError> {
        let matching = self
            .library
            .read()
            .await
            .values()
            .filter(|e| e.user_id == user_id)
            .filter(|e| status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();
        Ok(paginate(matching, limit, offset))
    }

    async fn delete_entry(&self, user_id: &str, manga_id: &str) -> Result<(), StoreError> {
        let key = (user_id.to_string(), manga_id.to_string());
        self.library
            .write()
            .await
            .remove(&key)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash-v0".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_email_and_username_conflict() {
        let store = MemoryStore::new();
        store.create_user(new_user("alice", "a@x.io")).await.unwrap();

        assert!(matches!(
            store.create_user(new_user("other", "a@x.io")).await,
            Err(StoreError::Conflict("email"))
        ));
        assert!(matches!(
            store.create_user(new_user("alice", "b@x.io")).await,
            Err(StoreError::Conflict("username"))
        ));
    }

    #[tokio::test]
    async fn versions_start_at_zero_and_step_by_one() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("alice", "a@x.io")).await.unwrap();
        assert_eq!(user.token_version, 0);

        assert_eq!(store.bump_token_version(&user.id).await.unwrap(), 1);
        assert_eq!(
            store
                .update_password_and_bump_version(&user.id, "hash-v1")
                .await
                .unwrap(),
            2
        );

        let stored = store.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.token_version, 2);
        assert_eq!(stored.password_hash, "hash-v1");
    }

    #[tokio::test]
    async fn failed_password_update_changes_nothing() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("alice", "a@x.io")).await.unwrap();
        store.force_token_version(&user.id, u64::MAX).await;

        let result = store
            .update_password_and_bump_version(&user.id, "hash-v1")
            .await;
        assert!(matches!(result, Err(StoreError::VersionOverflow)));

        let stored = store.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "hash-v0");
        assert_eq!(stored.token_version, u64::MAX);
    }

    #[tokio::test]
    async fn unknown_user_version_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get_token_version("nobody").await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.bump_token_version("nobody").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn library_delete_reports_missing_entries() {
        let store = MemoryStore::new();
        let entry = LibraryEntry {
            user_id: "u1".to_string(),
            manga_id: "m1".to_string(),
            current_chapter: 4,
            status: LibraryStatus::Reading,
            updated_at: Utc::now(),
        };
        store.upsert_entry(entry).await.unwrap();

        store.delete_entry("u1", "m1").await.unwrap();
        assert!(matches!(
            store.delete_entry("u1", "m1").await,
            Err(StoreError::NotFound)
        ));
    }

    fn entry(user_id: &str, manga_id: &str, status: LibraryStatus, age_secs: i64) -> LibraryEntry {
        LibraryEntry {
            user_id: user_id.to_string(),
            manga_id: manga_id.to_string(),
            current_chapter: 1,
            status,
            updated_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[tokio::test]
    async fn list_filters_by_owner_and_status_and_pages_newest_first() {
        let store = MemoryStore::new();
        store.upsert_entry(entry("u1", "old", LibraryStatus::Reading, 30)).await.unwrap();
        store.upsert_entry(entry("u1", "mid", LibraryStatus::Completed, 20)).await.unwrap();
        store.upsert_entry(entry("u1", "new", LibraryStatus::Reading, 10)).await.unwrap();
        store.upsert_entry(entry("u2", "other", LibraryStatus::Reading, 0)).await.unwrap();

        let (items, total) = store.list_entries("u1", None, 20, 0).await.unwrap();
        assert_eq!(total, 3);
        let ids: Vec<_> = items.iter().map(|e| e.manga_id.as_str()).collect();
        assert_eq!(ids, ["new", "mid", "old"]);

        let (items, total) = store
            .list_entries("u1", Some(LibraryStatus::Reading), 1, 1)
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].manga_id, "old");

        let (items, total) = store.list_entries("u1", None, 20, 10).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn get_entry_is_scoped_to_the_owner() {
        let store = MemoryStore::new();
        store.upsert_entry(entry("u1", "m1", LibraryStatus::Reading, 0)).await.unwrap();

        assert!(store.get_entry("u1", "m1").await.unwrap().is_some());
        assert!(store.get_entry("u2", "m1").await.unwrap().is_none());

        store.delete_entry("u1", "m1").await.unwrap();
        assert!(store.get_entry("u1", "m1").await.unwrap().is_none());
    }
}
