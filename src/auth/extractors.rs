use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::{
    auth::{service, token::TokenKeys},
    error::ApiError,
    state::AppState,
    store::UserRecord,
};

/// Header carrying the bearer token in both directions.
pub(crate) const X_AUTH: &str = "x-auth";

/// Authenticated request context: the resolved user plus the exact token
/// that was presented, kept so logout can revoke that token and no other.
pub struct AuthSession {
    pub user: UserRecord,
    pub token: String,
}

/// The single gate every protected route goes through. Whatever went wrong
/// underneath (missing header, malformed token, bad signature, revoked,
/// user gone), the caller sees one undifferentiated 401.
#[async_trait]
impl FromRequestParts<AppState> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(X_AUTH)
            .and_then(|h| h.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let keys = TokenKeys::from_ref(state);
        let user = match service::find_by_token(state.users.as_ref(), &keys, token).await {
            Ok(user) => user,
            Err(ApiError::Internal(e)) => return Err(ApiError::Internal(e)),
            Err(_) => {
                warn!("rejected token on protected route");
                return Err(ApiError::Unauthorized);
            }
        };

        Ok(AuthSession {
            user,
            token: token.to_string(),
        })
    }
}
