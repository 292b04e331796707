//! Liveness and readiness checks.

use axum::{extract::State, http::StatusCode, Json};
use mangahub_shared::{ReadinessReport, StatusResponse};

use crate::state::AppState;

pub async fn health() -> Json<StatusResponse> {
    Json(StatusResponse::new("ok"))
}

/// 503 when the store does not answer; connection counts are reported either way.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessReport>) {
    let store_ok = match state.users.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("readiness check failed: {}", e);
            false
        }
    };

    let stats = state.sync_hub.stats().await;
    let report = ReadinessReport {
        status: if store_ok { "ready" } else { "unavailable" }.to_string(),
        store: if store_ok { "ok" } else { "unreachable" }.to_string(),
        tcp_clients: stats.tcp_clients,
        ws_clients: stats.ws_clients,
        chat_rooms: state.chat_hub.room_count().await,
        notify_clients: state.notify_registry().len().await,
    };

    let status = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}
