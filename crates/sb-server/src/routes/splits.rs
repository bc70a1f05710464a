use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sb_common::api::{
    CreateSplitRequest, CreateSplitResponse, SplitPreviewRequest, SplitPreviewResponse,
};
use sb_common::document::{SplitDocument, SplitDocumentParts};
use sb_common::error::{AppError, AppResult};
use sb_common::split::{compute, input_from_entries};
use sb_common::types::SplitSummaryRecord;
use serde::Deserialize;

use super::parse_id;
use crate::state::AppState;
use crate::stores::client::ClientStore;
use crate::stores::invoice::InvoiceStore;
use crate::stores::project::{NewTeamMember, ProjectStore};
use crate::stores::split::{NewSplit, SplitStore};

#[derive(Debug, Default, Deserialize)]
pub struct SplitQuery {
    pub project_id: Option<String>,
}

/// Computes a split without recording anything. Over-allocation is reported
/// in the response rather than rejected.
pub async fn preview(
    State(state): State<AppState>,
    Json(payload): Json<SplitPreviewRequest>,
) -> AppResult<Json<SplitPreviewResponse>> {
    let company_profit_percentage = payload
        .company_profit_percentage
        .unwrap_or(state.default_company_profit_percentage);
    let input = input_from_entries(
        payload.total_amount,
        &payload.team_members,
        payload.agent.as_ref(),
        company_profit_percentage,
    )?;
    let outcome = compute(&input)?;
    let rounded = outcome.rounded();

    Ok(Json(SplitPreviewResponse {
        total_amount: outcome.total_amount,
        company_profit_percentage,
        exact: outcome.shares(),
        rounded: rounded.shares(),
        member_shares: rounded.member_shares.clone(),
        company_profit_nominal: outcome.company_profit_nominal,
        unallocated: outcome.unallocated(),
        over_allocated: outcome.is_over_allocated(),
    }))
}

/// Records the split for one invoice together with its team member rows
/// and the project's agent commission.
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateSplitRequest>,
) -> AppResult<(StatusCode, Json<CreateSplitResponse>)> {
    ProjectStore::new(state.db_pool.clone())
        .require(payload.project_id)
        .await?;
    let invoice = InvoiceStore::new(state.db_pool.clone())
        .require(payload.invoice_id)
        .await?;
    if invoice.project_id != payload.project_id {
        return Err(AppError::InvalidInput(format!(
            "invoice {} does not belong to project {}",
            invoice.invoice_number, payload.project_id
        )));
    }

    let company_profit_percentage = payload
        .company_profit_percentage
        .unwrap_or(state.default_company_profit_percentage);
    let input = input_from_entries(
        payload.total_amount.unwrap_or(invoice.total),
        &payload.team_members,
        payload.agent.as_ref(),
        company_profit_percentage,
    )?;
    let outcome = compute(&input)?;
    if outcome.is_over_allocated() {
        tracing::warn!(
            invoice_id = %invoice.invoice_id,
            company_profit = %outcome.company_profit,
            "rejected over-allocated split"
        );
        return Err(AppError::OverAllocated(format!(
            "team {} and commission {} exceed total {}",
            outcome.team_total, outcome.commission, outcome.total_amount
        )));
    }

    let team_members = payload
        .team_members
        .iter()
        .zip(&input.team_members)
        .map(|(entry, contribution)| NewTeamMember {
            user_id: entry.user_id,
            role: entry.role.clone(),
            contribution_type: contribution.contribution_type,
            contribution: contribution.contribution,
        })
        .collect();

    let created = SplitStore::new(state.db_pool.clone())
        .create(&NewSplit {
            project_id: payload.project_id,
            invoice_id: payload.invoice_id,
            outcome: outcome.rounded(),
            company_profit_percentage,
            team_members,
            agent: input.agent.clone(),
        })
        .await?;
    tracing::info!(
        split_id = %created.summary.split_id,
        invoice_id = %created.summary.invoice_id,
        adjusted = outcome.is_adjusted(),
        "split recorded"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list(
    Query(query): Query<SplitQuery>,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<SplitSummaryRecord>>> {
    let project_id = query
        .project_id
        .as_deref()
        .map(|raw| parse_id(raw, "project"))
        .transpose()?;
    let splits = SplitStore::new(state.db_pool.clone())
        .list(project_id)
        .await?;
    Ok(Json(splits))
}

pub async fn get(
    Path(split_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Json<SplitSummaryRecord>> {
    let split_id = parse_id(&split_id, "split")?;
    let split = SplitStore::new(state.db_pool.clone())
        .require(split_id)
        .await?;
    Ok(Json(split))
}

pub async fn get_for_invoice(
    Path((project_id, invoice_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> AppResult<Json<SplitSummaryRecord>> {
    let project_id = parse_id(&project_id, "project")?;
    let invoice_id = parse_id(&invoice_id, "invoice")?;
    SplitStore::new(state.db_pool.clone())
        .find_for_invoice(project_id, invoice_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("split"))
}

pub async fn document(
    Path(split_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Json<SplitDocument>> {
    let split_id = parse_id(&split_id, "split")?;
    let summary = SplitStore::new(state.db_pool.clone())
        .require(split_id)
        .await?;
    let projects = ProjectStore::new(state.db_pool.clone());
    let project = projects.require(summary.project_id).await?;
    let members = projects.list_split_members(split_id).await?;
    let commission = projects.get_commission(summary.project_id).await?;
    let invoice = InvoiceStore::new(state.db_pool.clone())
        .require(summary.invoice_id)
        .await?;
    let client = ClientStore::new(state.db_pool.clone())
        .require(project.client_id)
        .await?;

    Ok(Json(SplitDocument::build(SplitDocumentParts {
        summary: &summary,
        project: &project,
        client: &client,
        invoice: &invoice,
        members: &members,
        commission: commission.as_ref(),
    })))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::Router;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::json;

    use crate::routes::test_support::{decimal, seed_project, send, test_app};

    async fn seed_invoice(app: &Router, project_id: &str, rate: u32) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/api/v1/invoices",
            Some(json!({
                "project_id": project_id,
                "line_items": [{"description": "Build", "quantity": 1, "rate": rate}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["invoice_id"].as_str().expect("invoice_id").to_string()
    }

    #[tokio::test]
    async fn preview_reports_unallocated_and_over_allocation() {
        let app = test_app(None).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/splits/preview",
            Some(json!({
                "total_amount": 1000,
                "team_members": [
                    {"contribution_type": "percentage", "contribution": 50},
                    {"contribution_type": "fixed", "contribution": 100}
                ],
                "agent": {"agent_name": "Dana", "rate": 10},
                "company_profit_percentage": 25
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decimal(&body["exact"]["team_total"]), dec!(600));
        assert_eq!(decimal(&body["exact"]["commission"]), dec!(100));
        assert_eq!(decimal(&body["exact"]["company_profit"]), dec!(250));
        assert_eq!(decimal(&body["unallocated"]), dec!(50));
        assert_eq!(body["over_allocated"], false);

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/splits/preview",
            Some(json!({
                "total_amount": 100,
                "team_members": [{"contribution_type": "fixed", "contribution": 100}],
                "agent": {"agent_name": "Dana", "rate": 10}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decimal(&body["company_profit_percentage"]), dec!(25));
        assert_eq!(decimal(&body["exact"]["company_profit"]), dec!(-10));
        assert_eq!(body["over_allocated"], true);

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/splits/preview",
            Some(json!({
                "total_amount": -5,
                "team_members": [{"contribution_type": "bonus", "contribution": 1}],
                "agent": {"agent_name": " ", "rate": 120}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["violations"].as_array().map(Vec::len), Some(4));
    }

    #[tokio::test]
    async fn preview_handles_amounts_at_the_decimal_limit() {
        let app = test_app(None).await;
        let max = "79228162514264337593543950335";

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/splits/preview",
            Some(json!({
                "total_amount": max,
                "team_members": [{"contribution_type": "percentage", "contribution": 100}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decimal(&body["exact"]["team_total"]), Decimal::MAX);
        assert_eq!(decimal(&body["unallocated"]), dec!(0));
        assert_eq!(body["over_allocated"], false);

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/splits/preview",
            Some(json!({
                "total_amount": 1,
                "team_members": [
                    {"contribution_type": "fixed", "contribution": max},
                    {"contribution_type": "fixed", "contribution": max}
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["violations"][0]["field"], "team_members");
    }

    #[tokio::test]
    async fn create_records_split_once_and_renders_document() {
        let app = test_app(None).await;
        let project_id = seed_project(&app).await;
        let invoice_id = seed_invoice(&app, &project_id, 1000).await;

        let request = json!({
            "project_id": project_id,
            "invoice_id": invoice_id,
            "team_members": [
                {"role": "dev", "contribution_type": "percentage", "contribution": 40},
                {"role": "design", "contribution_type": "fixed", "contribution": 200}
            ],
            "agent": {"agent_name": "Dana", "rate": 10}
        });
        let (status, body) = send(&app, "POST", "/api/v1/splits", Some(request.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(decimal(&body["summary"]["total_amount"]), dec!(1000));
        assert_eq!(decimal(&body["summary"]["team_total"]), dec!(600));
        assert_eq!(decimal(&body["summary"]["commission"]), dec!(100));
        assert_eq!(decimal(&body["summary"]["company_profit"]), dec!(250));
        assert_eq!(body["team_members"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["commission"]["agent_name"], "Dana");
        let split_id = body["summary"]["split_id"].as_str().expect("split_id").to_string();

        let (status, _) = send(&app, "POST", "/api/v1/splits", Some(request)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(
            &app,
            "GET",
            &format!("/api/v1/projects/{project_id}/invoices/{invoice_id}/split"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["split_id"], split_id);

        let (status, body) = send(
            &app,
            "GET",
            &format!("/api/v1/splits/{split_id}/document"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["client_name"], "Acme");
        assert!(body["invoice_number"]
            .as_str()
            .is_some_and(|number| number.starts_with("INV-") && number.ends_with("-0001")));
        assert_eq!(decimal(&body["team_members"][0]["amount"]), dec!(400));
        assert_eq!(decimal(&body["agent"]["amount"]), dec!(100));

        let (status, _) = send(&app, "DELETE", &format!("/api/v1/invoices/{invoice_id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) = send(
            &app,
            "GET",
            &format!("/api/v1/splits?project_id={project_id}"),
            None,
        )
        .await;
        assert_eq!(body.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn create_rejects_over_allocation_and_foreign_invoice() {
        let app = test_app(None).await;
        let project_id = seed_project(&app).await;
        let invoice_id = seed_invoice(&app, &project_id, 100).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/splits",
            Some(json!({
                "project_id": project_id,
                "invoice_id": invoice_id,
                "team_members": [{"contribution_type": "fixed", "contribution": 100}],
                "agent": {"agent_name": "Dana", "rate": 10}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "over_allocated");

        let (_, splits) = send(&app, "GET", "/api/v1/splits", None).await;
        assert_eq!(splits.as_array().map(Vec::len), Some(0));

        let other_project = seed_project(&app).await;
        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/splits",
            Some(json!({
                "project_id": other_project,
                "invoice_id": invoice_id,
                "team_members": []
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "GET",
            &format!("/api/v1/projects/{project_id}/invoices/{invoice_id}/split"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
