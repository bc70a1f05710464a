pub mod auth;
pub mod clients;
pub mod dashboard;
pub mod health;
pub mod invoices;
pub mod projects;
pub mod recurring;
pub mod splits;
pub mod users;

use axum::routing::{get, post, put};
use axum::{middleware, Router};
use sb_common::error::{AppError, AppResult};
use uuid::Uuid;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/v1/users", get(users::list).post(users::create))
        .route("/api/v1/users/{user_id}", get(users::get))
        .route("/api/v1/clients", get(clients::list).post(clients::create))
        .route(
            "/api/v1/clients/{client_id}",
            get(clients::get).put(clients::update).delete(clients::delete),
        )
        .route("/api/v1/projects", get(projects::list).post(projects::create))
        .route(
            "/api/v1/projects/{project_id}",
            get(projects::get)
                .put(projects::update)
                .delete(projects::delete),
        )
        .route(
            "/api/v1/projects/{project_id}/team-members",
            get(projects::list_team_members).post(projects::add_team_member),
        )
        .route(
            "/api/v1/team-members/{member_id}",
            put(projects::update_team_member).delete(projects::delete_team_member),
        )
        .route(
            "/api/v1/projects/{project_id}/commission",
            get(projects::get_commission).post(projects::create_commission),
        )
        .route(
            "/api/v1/commissions/{commission_id}",
            put(projects::update_commission).delete(projects::delete_commission),
        )
        .route(
            "/api/v1/projects/{project_id}/invoices",
            get(invoices::list_for_project),
        )
        .route(
            "/api/v1/projects/{project_id}/invoices/{invoice_id}/split",
            get(splits::get_for_invoice),
        )
        .route("/api/v1/invoices", get(invoices::list).post(invoices::create))
        .route(
            "/api/v1/invoices/{invoice_id}",
            get(invoices::get)
                .put(invoices::update)
                .delete(invoices::delete),
        )
        .route(
            "/api/v1/invoices/{invoice_id}/line-items",
            get(invoices::list_line_items).post(invoices::add_line_item),
        )
        .route(
            "/api/v1/invoices/{invoice_id}/document",
            get(invoices::document),
        )
        .route(
            "/api/v1/line-items/{line_item_id}",
            put(invoices::update_line_item).delete(invoices::delete_line_item),
        )
        .route(
            "/api/v1/recurring-invoices",
            get(recurring::list).post(recurring::create),
        )
        .route(
            "/api/v1/recurring-invoices/{recurring_id}",
            get(recurring::get)
                .put(recurring::update)
                .delete(recurring::delete),
        )
        .route(
            "/api/v1/recurring-invoices/{recurring_id}/issue",
            post(recurring::issue),
        )
        .route("/api/v1/splits/preview", post(splits::preview))
        .route("/api/v1/splits", get(splits::list).post(splits::create))
        .route("/api/v1/splits/{split_id}", get(splits::get))
        .route("/api/v1/splits/{split_id}/document", get(splits::document))
        .route("/api/v1/dashboard/stats", get(dashboard::stats))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_session,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/admin/login", post(auth::admin_login))
        .route("/admin/logout", post(auth::admin_logout))
        .route("/auth/me", get(auth::auth_me))
        .merge(api)
        .with_state(state)
}

/// Parses a path id, naming the resource in the 400 when it is malformed.
pub(crate) fn parse_id(raw: &str, what: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::InvalidInput(format!("malformed {what} id")))
}

/// Parses one of the domain's text enums from a request field.
pub(crate) fn parse_enum<T>(
    field: &str,
    raw: &str,
    parse: impl Fn(&str) -> Option<T>,
    expected: String,
) -> AppResult<T> {
    parse(raw).ok_or_else(|| {
        AppError::InvalidInput(format!("{field} must be one of {expected}, got {raw:?}"))
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::build_router;
    use crate::db::connect_in_memory;
    use crate::state::AppState;

    pub async fn test_app(admin_password: Option<&str>) -> Router {
        let pool = connect_in_memory().await.expect("pool");
        build_router(AppState::for_tests(pool, admin_password))
    }

    pub async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json")
        };
        (status, json)
    }

    /// Decimals serialize as strings; compares by value, not by scale.
    pub fn decimal(value: &Value) -> Decimal {
        value
            .as_str()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_else(|| panic!("not a decimal: {value}"))
    }

    /// Creates a client and a project under it, returning the project id.
    pub async fn seed_project(app: &Router) -> String {
        let (status, client) = send(
            app,
            "POST",
            "/api/v1/clients",
            Some(json!({"name": "Acme", "email": "ops@acme.test", "company": "Acme Ltd"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, project) = send(
            app,
            "POST",
            "/api/v1/projects",
            Some(json!({"client_id": client["client_id"], "name": "Website"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        project["project_id"].as_str().expect("project_id").to_string()
    }
}
