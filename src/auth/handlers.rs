use axum::{
    extract::{FromRef, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, PublicUser, RegisterRequest, UserEnvelope},
        extractors::{AuthSession, X_AUTH},
        service,
        token::TokenKeys,
    },
    error::ApiError,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/login", post(login))
        .route("/users/me", get(me).delete(delete_me))
        .route("/users/me/token", delete(logout))
}

fn token_header(token: &str) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(token)
        .map_err(|e| ApiError::Internal(anyhow::Error::new(e).context("token header value")))?;
    headers.insert(HeaderName::from_static(X_AUTH), value);
    Ok(headers)
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(HeaderMap, Json<UserEnvelope>), ApiError> {
    let user = service::create_user(state.users.as_ref(), &payload.email, &payload.password).await?;

    let keys = TokenKeys::from_ref(&state);
    let token = service::issue_token(state.users.as_ref(), &keys, &user).await?;

    Ok((
        token_header(&token)?,
        Json(UserEnvelope {
            user: PublicUser::from(&user),
        }),
    ))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<UserEnvelope>), ApiError> {
    let user =
        service::find_by_credentials(state.users.as_ref(), &payload.email, &payload.password)
            .await?;

    let keys = TokenKeys::from_ref(&state);
    let token = service::issue_token(state.users.as_ref(), &keys, &user).await?;

    Ok((
        token_header(&token)?,
        Json(UserEnvelope {
            user: PublicUser::from(&user),
        }),
    ))
}

#[instrument(skip_all)]
async fn me(session: AuthSession) -> Json<UserEnvelope> {
    Json(UserEnvelope {
        user: PublicUser::from(&session.user),
    })
}

#[instrument(skip_all)]
async fn logout(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<StatusCode, ApiError> {
    service::remove_token(state.users.as_ref(), session.user.id, &session.token).await?;
    Ok(StatusCode::OK)
}

#[instrument(skip_all)]
async fn delete_me(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<StatusCode, ApiError> {
    service::delete_account(state.users.as_ref(), session.user.id).await?;
    Ok(StatusCode::OK)
}
