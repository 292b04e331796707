//! Entry point for chapter-release announcements.

use axum::{extract::State, Json};
use mangahub_shared::{NewChapterRequest, NewChapterResponse};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;

/// `POST /api/notify/new-chapter`: pushes a UDP notice to every registered client.
pub async fn new_chapter(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<NewChapterRequest>,
) -> Result<Json<NewChapterResponse>, ApiError> {
    let manga_id = payload.manga_id.trim();
    if manga_id.is_empty() {
        return Err(ApiError::BadRequest("manga_id is required".to_string()));
    }

    tracing::info!(
        "{} announced chapter {} of {}",
        claims.username,
        payload.chapter,
        manga_id
    );
    let recipients = state
        .notifier
        .broadcast_new_chapter(manga_id, payload.chapter)
        .await;
    Ok(Json(NewChapterResponse { recipients }))
}
