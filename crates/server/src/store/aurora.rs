//! On-disk store backed by aurora-db.
//!
//! Every field is stored as a string; numbers and timestamps are parsed on read.

use async_trait::async_trait;
use aurora_db::{Aurora, Document, FieldType};
use chrono::{DateTime, Utc};
use mangahub_shared::{LibraryEntry, LibraryStatus};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{next_version, paginate, LibraryStore, NewUser, StoreError, User, UserStore};

const USERS: &str = "users";
const LIBRARY: &str = "library_entries";

pub struct AuroraStore {
    db: Aurora,
    /// Serialises read-modify-write sequences; aurora-db has no compare-and-set.
    writes: Mutex<()>,
}

impl AuroraStore {
    /// Opens (or creates) the database at `path` and ensures both collections exist.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let db = Aurora::open(path).map_err(backend)?;

        // Fails harmlessly when the collection already exists.
        let _ = db.new_collection(
            USERS,
            vec![
                ("id", FieldType::String, true),
                ("username", FieldType::String, true),
                ("email", FieldType::String, true),
                ("password_hash", FieldType::String, false),
                ("token_version", FieldType::String, false),
                ("created_at", FieldType::String, false),
            ],
        );

        let _ = db.new_collection(
            LIBRARY,
            vec![
                ("user_id", FieldType::String, false),
                ("manga_id", FieldType::String, false),
                ("current_chapter", FieldType::String, false),
                ("status", FieldType::String, false),
                ("updated_at", FieldType::String, false),
                // Entries are tombstoned rather than removed.
                ("removed", FieldType::String, false),
            ],
        );

        tracing::info!("opened aurora store at {}", path);
        Ok(Self {
            db,
            writes: Mutex::new(()),
        })
    }

    async fn user_doc(&self, field: &'static str, value: &str) -> Result<Option<Document>, StoreError> {
        let value = value.to_string();
        let docs = self
            .db
            .query(USERS)
            .filter(move |f| f.eq(field, value.clone()))
            .collect()
            .await
            .map_err(backend)?;
        Ok(docs.into_iter().next())
    }

    async fn find_user(&self, field: &'static str, value: &str) -> Result<Option<User>, StoreError> {
        self.user_doc(field, value)
            .await?
            .map(|doc| user_from_doc(&doc))
            .transpose()
    }

    async fn entry_doc(&self, user_id: &str, manga_id: &str) -> Result<Option<Document>, StoreError> {
        let uid = user_id.to_string();
        let mid = manga_id.to_string();
        let docs = self
            .db
            .query(LIBRARY)
            .filter(move |f| f.eq("user_id", uid.clone()) & f.eq("manga_id", mid.clone()))
            .collect()
            .await
            .map_err(backend)?;
        Ok(docs.into_iter().next())
    }

    async fn live_entry_doc(&self, user_id: &str, manga_id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .entry_doc(user_id, manga_id)
            .await?
            .filter(|doc| text(doc, "removed") != "true"))
    }
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    tracing::error!("aurora error: {}", e);
    StoreError::Backend(e.to_string())
}

fn text(doc: &Document, key: &str) -> String {
    doc.data
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn user_from_doc(doc: &Document) -> Result<User, StoreError> {
    let token_version = text(doc, "token_version")
        .parse::<u64>()
        .map_err(|e| StoreError::Backend(format!("corrupt token_version: {e}")))?;
    let created_at = DateTime::parse_from_rfc3339(&text(doc, "created_at"))
        .map_err(|e| StoreError::Backend(format!("corrupt created_at: {e}")))?
        .with_timezone(&Utc);

    Ok(User {
        id: text(doc, "id"),
        username: text(doc, "username"),
        email: text(doc, "email"),
        password_hash: text(doc, "password_hash"),
        token_version,
        created_at,
    })
}

fn entry_from_doc(doc: &Document) -> Result<LibraryEntry, StoreError> {
    let current_chapter = text(doc, "current_chapter")
        .parse::<u32>()
        .map_err(|e| StoreError::Backend(format!("corrupt current_chapter: {e}")))?;
    let status = LibraryStatus::parse(&text(doc, "status"))
        .ok_or_else(|| StoreError::Backend("corrupt status".to_string()))?;
    let updated_at = DateTime::parse_from_rfc3339(&text(doc, "updated_at"))
        .map_err(|e| StoreError::Backend(format!("corrupt updated_at: {e}")))?
        .with_timezone(&Utc);

    Ok(LibraryEntry {
        user_id: text(doc, "user_id"),
        manga_id: text(doc, "manga_id"),
        current_chapter,
        status,
        updated_at,
    })
}

#[async_trait]
impl UserStore for AuroraStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let _guard = self.writes.lock().await;
        if self.user_doc("email", &new_user.email).await?.is_some() {
            return Err(StoreError::Conflict("email"));
        }
        if self.user_doc("username", &new_user.username).await?.is_some() {
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

        self.db
            .insert_into(
                USERS,
                vec![
                    ("id", user.id.clone().into()),
                    ("username", user.username.clone().into()),
                    ("email", user.email.clone().into()),
                    ("password_hash", user.password_hash.clone().into()),
                    ("token_version", user.token_version.to_string().into()),
                    ("created_at", user.created_at.to_rfc3339().into()),
                ],
            )
            .await
            .map_err(backend)?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_user("email", email).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.find_user("username", username).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.find_user("id", id).await
    }

    async fn get_token_version(&self, user_id: &str) -> Result<u64, StoreError> {
        self.find_by_id(user_id)
            .await?
            .map(|u| u.token_version)
            .ok_or(StoreError::NotFound)
    }

    async fn bump_token_version(&self, user_id: &str) -> Result<u64, StoreError> {
        let _guard = self.writes.lock().await;
        let doc = self.user_doc("id", user_id).await?.ok_or(StoreError::NotFound)?;
        let version = next_version(user_from_doc(&doc)?.token_version)?;

        self.db
            .update_document(USERS, &doc.id, vec![("token_version", version.to_string().into())])
            .await
            .map_err(backend)?;
        Ok(version)
    }

    async fn update_password_and_bump_version(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<u64, StoreError> {
        let _guard = self.writes.lock().await;
        let doc = self.user_doc("id", user_id).await?.ok_or(StoreError::NotFound)?;
        let version = next_version(user_from_doc(&doc)?.token_version)?;

        // One document write carries both fields.
        self.db
            .update_document(
                USERS,
                &doc.id,
                vec![
                    ("password_hash", password_hash.to_string().into()),
                    ("token_version", version.to_string().into()),
                ],
            )
            .await
            .map_err(backend)?;
        Ok(version)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db
            .query(USERS)
            .filter(|f| f.eq("id", ""))
            .collect()
            .await
            .map(|_| ())
            .map_err(backend)
    }
}

#[async_trait]
impl LibraryStore for AuroraStore {
    async fn upsert_entry(&self, entry: LibraryEntry) -> Result<LibraryEntry, StoreError> {
        let fields = vec![
            ("current_chapter", entry.current_chapter.to_string().into()),
            ("status", entry.status.as_str().into()),
            ("updated_at", entry.updated_at.to_rfc3339().into()),
            ("removed", "false".into()),
        ];

        let _guard = self.writes.lock().await;
        match self.entry_doc(&entry.user_id, &entry.manga_id).await? {
            Some(doc) => {
                self.db
                    .update_document(LIBRARY, &doc.id, fields)
                    .await
                    .map_err(backend)?;
            }
            None => {
                let mut fields = fields;
                fields.push(("user_id", entry.user_id.clone().into()));
                fields.push(("manga_id", entry.manga_id.clone().into()));
                self.db.insert_into(LIBRARY, fields).await.map_err(backend)?;
            }
        }
        Ok(entry)
    }

    async fn get_entry(
        &self,
        user_id: &str,
        manga_id: &str,
    ) -> Result<Option<LibraryEntry>, StoreError> {
        self.live_entry_doc(user_id, manga_id)
            .await?
            .map(|doc| entry_from_doc(&doc))
            .transpose()
    }

    async fn list_entries(
        &self,
        user_id: &str,
        status: Option<LibraryStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<LibraryEntry>, usize), StoreError> {
        let uid = user_id.to_string();
        let docs = self
            .db
            .query(LIBRARY)
            .filter(move |f| f.eq("user_id", uid.clone()))
            .collect()
            .await
            .map_err(backend)?;

        let mut matching = Vec::new();
        for doc in docs.iter().filter(|doc| text(doc, "removed") != "true") {
            let entry = entry_from_doc(doc)?;
            if status.map_or(true, |s| entry.status == s) {
                matching.push(entry);
            }
        }
        Ok(paginate(matching, limit, offset))
    }

    async fn delete_entry(&self, user_id: &str, manga_id: &str) -> Result<(), StoreError> {
        let _guard = self.writes.lock().await;
        let doc = self
            .live_entry_doc(user_id, manga_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        self.db
            .update_document(LIBRARY, &doc.id, vec![("removed", "true".into())])
            .await
            .map_err(backend)?;
        Ok(())
    }
}
