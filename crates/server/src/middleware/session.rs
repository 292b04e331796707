//! Bearer-token session extractor.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use crate::error::ApiError;
use crate::jwt::{AuthError, Claims};
use crate::state::AppState;
use crate::store::StoreError;

/// A caller whose token is valid and not revoked.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let app_state = AppState::from_ref(state);
        let token = bearer_token(&parts.headers).map(str::to_owned);

        async move {
            let token = token.ok_or(AuthError::MissingToken)?;
            let claims = authenticate(&app_state, &token).await?;
            Ok(AuthUser(claims))
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Verifies the token and requires its version to equal the stored one.
pub async fn authenticate(state: &AppState, token: &str) -> Result<Claims, ApiError> {
    let claims = state.tokens.parse(token)?;

    let current = match state.users.get_token_version(&claims.user_id).await {
        Ok(version) => version,
        Err(StoreError::NotFound) => return Err(AuthError::UnknownUser.into()),
        Err(e) => return Err(e.into()),
    };

    if claims.token_version != current {
        return Err(AuthError::Revoked.into());
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_bearer_tokens_only() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("bearer  abc ")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
