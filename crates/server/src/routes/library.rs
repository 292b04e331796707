//! Library reads and mutations. Each successful write is announced on the sync hub.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use mangahub_shared::{
    LibraryEntry, LibraryEvent, LibraryListQuery, LibraryListResponse, LibraryStatus,
    LibraryUpsertRequest, StatusResponse,
};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;
use crate::store::StoreError;

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;

/// Resolves list parameters. Bad or out-of-range numbers fall back to the
/// defaults; an unknown status is an error.
fn list_params(query: &LibraryListQuery) -> Result<(Option<LibraryStatus>, usize, usize), ApiError> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            LibraryStatus::parse(raw)
                .ok_or_else(|| ApiError::BadRequest("invalid status filter".to_string()))?,
        ),
    };

    let limit = query
        .limit
        .as_deref()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| (1..=MAX_PAGE_SIZE).contains(n))
        .unwrap_or(DEFAULT_PAGE_SIZE);
    let offset = query
        .offset
        .as_deref()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    Ok((status, limit, offset))
}

fn entry_not_found() -> ApiError {
    ApiError::NotFound("library entry not found".to_string())
}

fn build_entry(
    user_id: &str,
    manga_id: Option<&str>,
    payload: &LibraryUpsertRequest,
) -> Result<LibraryEntry, ApiError> {
    let manga_id = manga_id.map(str::trim).unwrap_or_default();
    if manga_id.is_empty() {
        return Err(ApiError::BadRequest("manga_id is required".to_string()));
    }

    let status = LibraryStatus::parse(&payload.status).ok_or_else(|| {
        ApiError::BadRequest(format!("unknown library status {:?}", payload.status))
    })?;

    let current_chapter = match status {
        LibraryStatus::Blacklist => 0,
        _ => payload.current_chapter,
    };

    Ok(LibraryEntry {
        user_id: user_id.to_string(),
        manga_id: manga_id.to_string(),
        current_chapter,
        status,
        updated_at: Utc::now(),
    })
}

async fn upsert(state: &AppState, entry: LibraryEntry) -> Result<Json<LibraryEntry>, ApiError> {
    let entry = state.library.upsert_entry(entry).await?;
    state.sync_hub.broadcast(&LibraryEvent::updated(&entry)).await;
    Ok(Json(entry))
}

/// `GET /api/library?status=&limit=&offset=`
pub async fn list_entries(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Query(query): Query<LibraryListQuery>,
) -> Result<Json<LibraryListResponse>, ApiError> {
    let (status, limit, offset) = list_params(&query)?;
    let (items, total) = state
        .library
        .list_entries(&claims.user_id, status, limit, offset)
        .await?;

    Ok(Json(LibraryListResponse {
        items,
        total,
        limit,
        offset,
    }))
}

/// `GET /api/library/{manga_id}`
pub async fn get_entry(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(manga_id): Path<String>,
) -> Result<Json<LibraryEntry>, ApiError> {
    state
        .library
        .get_entry(&claims.user_id, manga_id.trim())
        .await?
        .map(Json)
        .ok_or_else(entry_not_found)
}

/// `POST /api/library`
pub async fn add_entry(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<LibraryUpsertRequest>,
) -> Result<Json<LibraryEntry>, ApiError> {
    let entry = build_entry(&claims.user_id, payload.manga_id.as_deref(), &payload)?;
    upsert(&state, entry).await
}

/// `PUT /api/library/{manga_id}`
pub async fn update_entry(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(manga_id): Path<String>,
    Json(payload): Json<LibraryUpsertRequest>,
) -> Result<Json<LibraryEntry>, ApiError> {
    let entry = build_entry(&claims.user_id, Some(&manga_id), &payload)?;
    upsert(&state, entry).await
}

/// `DELETE /api/library/{manga_id}`
pub async fn delete_entry(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(manga_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    state
        .library
        .delete_entry(&claims.user_id, &manga_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => entry_not_found(),
            other => other.into(),
        })?;

    state
        .sync_hub
        .broadcast(&LibraryEvent::deleted(claims.user_id.as_str(), manga_id.as_str()))
        .await;
    Ok(Json(StatusResponse::new("deleted")))
}
