//! Session tokens.
//!
//! - Tokens are JWTs signed with HS256; any other algorithm is rejected.
//! - Each token carries the user's `token_version` at signing time. The
//!   session middleware compares it against the stored value, so bumping the
//!   stored version revokes every outstanding token for that user.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::store::User;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("token rejected: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("token has been revoked")]
    Revoked,
    #[error("unknown user")]
    UnknownUser,
    #[error("token lifetime out of range")]
    Lifetime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub token_version: u64,
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], issuer: impl Into<String>, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            ttl,
        }
    }

    /// Signs a token bound to the user's current `token_version`.
    pub fn sign(&self, user: &User) -> Result<(String, DateTime<Utc>), AuthError> {
        let now = Utc::now();
        let expires_at = now.checked_add_signed(self.ttl).ok_or(AuthError::Lifetime)?;

        let claims = Claims {
            user_id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            token_version: user.token_version,
            iss: self.issuer.clone(),
            sub: user.id.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());

        let token = jsonwebtoken::encode(&header, &claims, &self.encoding)?;
        Ok((token, expires_at))
    }

    /// Checks signature, algorithm, issuer and expiry. Revocation is not checked here.
    pub fn parse(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}
