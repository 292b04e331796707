//! MangaHub Server
//!
//! Live library sync (TCP + WebSocket), room chat, UDP chapter notifications
//! and revocable session tokens behind an Axum HTTP API.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod chat;
pub mod config;
pub mod connection;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod notify;
pub mod routes;
pub mod shutdown;
pub mod state;
pub mod store;
pub mod sync;

pub use state::AppState;

/// Builds the HTTP router over an already wired [`AppState`].
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(routes::health::health))
        .route("/ready", get(routes::health::ready))
        // Auth
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/logout", post(routes::auth::logout))
        .route("/api/auth/change-password", post(routes::auth::change_password))
        // Users
        .route("/api/users/me", get(routes::users::me))
        // Library
        .route(
            "/api/library",
            get(routes::library::list_entries).post(routes::library::add_entry),
        )
        .route(
            "/api/library/{manga_id}",
            get(routes::library::get_entry)
                .put(routes::library::update_entry)
                .delete(routes::library::delete_entry),
        )
        // Notifications
        .route("/api/notify/new-chapter", post(routes::notify::new_chapter))
        // Chat
        .route("/api/chat/history", get(chat::chat_history))
        // WebSocket
        .route("/api/ws/sync", get(sync::sync_ws_handler))
        .route("/api/ws/chat", get(chat::chat_ws_handler))
        // Apply middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
