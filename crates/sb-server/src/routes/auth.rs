use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use sb_common::api::{AdminLoginRequest, AdminLoginResponse, AuthMeResponse};
use sb_common::error::{AppError, AppResult};

use crate::auth::admin_session::new_session;
use crate::auth::authenticate;
use crate::db;
use crate::state::AppState;
use crate::stores::session::SessionStore;

pub async fn admin_login(
    State(state): State<AppState>,
    Json(payload): Json<AdminLoginRequest>,
) -> AppResult<Json<AdminLoginResponse>> {
    let expected = state.admin_password.as_deref().ok_or(AppError::Forbidden)?;

    if payload.password != expected {
        tracing::warn!("rejected admin login");
        return Err(AppError::Unauthorized);
    }

    let issued = new_session(Utc::now())?;
    let session = SessionStore::new(state.db_pool.clone())
        .create_password_session(&issued.token_hash, &issued.lookup_prefix, issued.expires_at)
        .await?;

    tracing::info!(token_prefix = %session.token_prefix, "admin session issued");
    Ok(Json(AdminLoginResponse {
        token: issued.token,
        expires_at: db::timestamp_text(session.expires_at),
    }))
}

pub async fn auth_me(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> AppResult<Json<AuthMeResponse>> {
    let session = authenticate(&state, &headers).await?;

    Ok(Json(AuthMeResponse {
        auth_method: session.auth_method,
        expires_at: db::timestamp_text(session.expires_at),
    }))
}

pub async fn admin_logout(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> AppResult<StatusCode> {
    let session = authenticate(&state, &headers).await?;

    SessionStore::new(state.db_pool.clone())
        .delete_by_prefix(&session.token_prefix)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
