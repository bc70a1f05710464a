use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sb_common::api::CreateUserRequest;
use sb_common::error::{AppError, AppResult};
use sb_common::types::{UserRecord, UserRole};
use sb_common::validation::ValidationErrors;

use super::{parse_enum, parse_id};
use crate::state::AppState;
use crate::stores::user::UserStore;

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<UserRecord>>> {
    let users = UserStore::new(state.db_pool.clone()).list().await?;
    Ok(Json(users))
}

pub async fn get(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Json<UserRecord>> {
    let user_id = parse_id(&user_id, "user")?;
    UserStore::new(state.db_pool.clone())
        .get(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("user"))
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserRecord>)> {
    let mut errors = ValidationErrors::new();
    errors.require_non_blank("name", &payload.name);
    errors.require_non_blank("email", &payload.email);
    if !payload.email.contains('@') {
        errors.push("email", "must be an email address");
    }
    errors.into_result(())?;

    let role = match payload.role.as_deref() {
        Some(raw) => parse_enum("role", raw, UserRole::parse, UserRole::expected())?,
        None => UserRole::TeamMember,
    };

    let user = UserStore::new(state.db_pool.clone())
        .create(payload.name.trim(), payload.email.trim(), role)
        .await?;
    tracing::info!(user_id = %user.user_id, role = %user.role, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::{send, test_app};

    #[tokio::test]
    async fn create_list_and_reject_duplicates() {
        let app = test_app(None).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/users",
            Some(json!({"name": "Alice", "email": "alice@studio.test"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["role"], "team_member");
        let user_id = body["user_id"].as_str().expect("user_id").to_string();

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/users",
            Some(json!({"name": "Alice", "email": "alice@studio.test", "role": "admin"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/users",
            Some(json!({"name": "Bob", "email": "bob@studio.test", "role": "owner"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_input");

        let (status, body) = send(&app, "GET", &format!("/api/v1/users/{user_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Alice");

        let (status, _) = send(&app, "GET", "/api/v1/users/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
