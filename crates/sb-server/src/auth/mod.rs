pub mod admin_session;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use sb_common::error::{AppError, AppResult};

use crate::state::AppState;
use crate::stores::session::{SessionRecord, SessionStore};
use admin_session::SessionToken;

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ")
}

/// Resolves the bearer token to a live admin session.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> AppResult<SessionRecord> {
    let token = bearer_token(headers)
        .and_then(SessionToken::parse)
        .ok_or(AppError::Unauthorized)?;

    let store = SessionStore::new(state.db_pool.clone());
    let session = store
        .lookup_by_prefix(token.lookup_prefix())
        .await?
        .ok_or(AppError::Unauthorized)?;

    if session.is_expired(Utc::now()) {
        return Err(AppError::Unauthorized);
    }
    if !token.matches(&session.token_hash)? {
        return Err(AppError::Unauthorized);
    }
    Ok(session)
}

/// Guards `/api/v1`. With no admin password configured the API is open.
pub async fn require_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if state.admin_password.is_some() {
        authenticate(&state, request.headers()).await?;
    }
    Ok(next.run(request).await)
}
