//! User routes.

use axum::Json;
use mangahub_shared::UserSummary;

use crate::middleware::AuthUser;

/// `GET /api/users/me`: identity as carried by the session token.
pub async fn me(AuthUser(claims): AuthUser) -> Json<UserSummary> {
    Json(UserSummary {
        id: claims.user_id,
        username: claims.username,
        email: claims.email,
    })
}
