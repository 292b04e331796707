//! HTTP error type rendered as `application/problem+json`.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use mangahub_shared::ProblemDetails;

use crate::jwt::AuthError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn problem(&self) -> (StatusCode, ProblemDetails) {
        match self {
            ApiError::BadRequest(d) => (StatusCode::BAD_REQUEST, ProblemDetails::bad_request(d)),
            ApiError::Unauthorized(d) => (StatusCode::UNAUTHORIZED, ProblemDetails::unauthorized(d)),
            ApiError::NotFound(d) => (StatusCode::NOT_FOUND, ProblemDetails::not_found(d)),
            ApiError::Conflict(d) => (StatusCode::CONFLICT, ProblemDetails::conflict(d)),
            ApiError::Internal(d) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ProblemDetails::internal_error(d),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, problem) = self.problem();
        (
            status,
            [(header::CONTENT_TYPE, "application/problem+json")],
            Json(problem),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::NotFound("not found".to_string()),
            StoreError::Conflict(field) => ApiError::Conflict(format!("{field} already taken")),
            other => {
                tracing::error!("store failure: {}", other);
                ApiError::Internal("storage failure".to_string())
            }
        }
    }
}

/// Every auth failure looks the same to the client.
impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        tracing::debug!("rejecting session: {}", e);
        ApiError::Unauthorized("invalid token".to_string())
    }
}
