use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sb_common::api::{CreateClientRequest, UpdateClientRequest};
use sb_common::error::AppResult;
use sb_common::types::ClientRecord;
use sb_common::validation::ValidationErrors;
use serde::Deserialize;

use super::parse_id;
use crate::state::AppState;
use crate::stores::client::ClientStore;

#[derive(Debug, Default, Deserialize)]
pub struct ClientQuery {
    pub search: Option<String>,
}

pub async fn list(
    Query(query): Query<ClientQuery>,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ClientRecord>>> {
    let clients = ClientStore::new(state.db_pool.clone())
        .list(query.search.as_deref())
        .await?;
    Ok(Json(clients))
}

pub async fn get(
    Path(client_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Json<ClientRecord>> {
    let client_id = parse_id(&client_id, "client")?;
    let client = ClientStore::new(state.db_pool.clone())
        .require(client_id)
        .await?;
    Ok(Json(client))
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateClientRequest>,
) -> AppResult<(StatusCode, Json<ClientRecord>)> {
    let mut errors = ValidationErrors::new();
    errors.require_non_blank("name", &payload.name);
    errors.require_non_blank("email", &payload.email);
    errors.into_result(())?;

    let client = ClientStore::new(state.db_pool.clone())
        .create(&payload)
        .await?;
    tracing::info!(client_id = %client.client_id, "client created");
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn update(
    Path(client_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateClientRequest>,
) -> AppResult<Json<ClientRecord>> {
    let client_id = parse_id(&client_id, "client")?;

    let mut errors = ValidationErrors::new();
    if let Some(name) = &payload.name {
        errors.require_non_blank("name", name);
    }
    if let Some(email) = &payload.email {
        errors.require_non_blank("email", email);
    }
    errors.into_result(())?;

    let client = ClientStore::new(state.db_pool.clone())
        .update(client_id, &payload)
        .await?;
    Ok(Json(client))
}

pub async fn delete(
    Path(client_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<StatusCode> {
    let client_id = parse_id(&client_id, "client")?;
    ClientStore::new(state.db_pool.clone())
        .delete(client_id)
        .await?;
    tracing::info!(client_id = %client_id, "client deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::{send, test_app};

    #[tokio::test]
    async fn crud_with_search_and_validation() {
        let app = test_app(None).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/clients",
            Some(json!({"name": " ", "email": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["violations"].as_array().map(Vec::len), Some(2));

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/clients",
            Some(json!({"name": "Acme", "email": "ops@acme.test", "company": "Acme Ltd"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let client_id = body["client_id"].as_str().expect("client_id").to_string();

        let (status, body) = send(&app, "GET", "/api/v1/clients?search=acme%20ltd", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/v1/clients/{client_id}"),
            Some(json!({"phone": "555-0100"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phone"], "555-0100");
        assert_eq!(body["name"], "Acme");

        let uri = format!("/api/v1/clients/{client_id}");
        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
    }
}
