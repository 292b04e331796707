//! Authentication routes (register, login, logout, change-password).

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::StatusCode, Json};
use mangahub_shared::{
    ChangePasswordRequest, LoginRequest, RegisterRequest, SessionResponse, StatusResponse,
};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;
use crate::store::{NewUser, User};

const INVALID_CREDENTIALS: &str = "invalid credentials";

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            tracing::error!("password hashing failed: {}", e);
            ApiError::Internal("password hashing failed".to_string())
        })
}

fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        tracing::error!("stored password hash is invalid: {}", e);
        ApiError::Internal("stored credentials are corrupt".to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    let len = password.chars().count();
    if !(8..=72).contains(&len) {
        return Err(ApiError::BadRequest(
            "password must be 8-72 characters".to_string(),
        ));
    }
    Ok(())
}

/// Trims and lowercases where appropriate; rejects malformed input.
fn validate_registration(payload: RegisterRequest) -> Result<RegisterRequest, ApiError> {
    let username = payload.username.trim().to_string();
    let email = payload.email.trim().to_lowercase();

    let len = username.chars().count();
    if !(3..=30).contains(&len) {
        return Err(ApiError::BadRequest(
            "username must be 3-30 characters".to_string(),
        ));
    }
    if !email.contains('@') || email.len() > 255 {
        return Err(ApiError::BadRequest("invalid email".to_string()));
    }
    validate_password(&payload.password)?;

    Ok(RegisterRequest {
        username,
        email,
        password: payload.password,
    })
}

fn session(state: &AppState, user: &User) -> Result<SessionResponse, ApiError> {
    let (token, expires_at) = state.tokens.sign(user).map_err(|e| {
        tracing::error!("failed to sign session token: {}", e);
        ApiError::Internal("failed to issue session".to_string())
    })?;
    Ok(SessionResponse {
        user: user.summary(),
        token,
        expires_at,
    })
}

/// Register a new account and open a session for it.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let payload = validate_registration(payload)?;
    tracing::info!("Registering user: {}", payload.username);

    let password_hash = hash_password(&payload.password)?;
    let user = state
        .users
        .create_user(NewUser {
            username: payload.username,
            email: payload.email,
            password_hash,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(session(&state, &user)?)))
}

/// Login with email and password.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let email = payload.email.trim().to_lowercase();

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    tracing::info!("Logged in user: {}", user.username);
    Ok(Json(session(&state, &user)?))
}

/// Revokes every token issued to the caller so far.
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<StatusResponse>, ApiError> {
    let version = state.users.bump_token_version(&claims.user_id).await?;
    tracing::info!("user {} logged out (token version {})", claims.username, version);
    Ok(Json(StatusResponse::new("logged out")))
}

/// Replaces the password and revokes outstanding tokens in the same write.
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    validate_password(&payload.new_password)?;

    let user = state
        .users
        .find_by_id(&claims.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("invalid token".to_string()))?;

    if !verify_password(&payload.old_password, &user.password_hash)? {
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let password_hash = hash_password(&payload.new_password)?;
    let version = state
        .users
        .update_password_and_bump_version(&user.id, &password_hash)
        .await?;

    tracing::info!("user {} changed password (token version {})", user.username, version);
    Ok(Json(StatusResponse::new("password updated")))
}
