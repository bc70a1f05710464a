use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use sb_common::api::{
    CreateRecurringRequest, IssueResponse, LineItemInput, UpdateRecurringRequest,
};
use sb_common::error::AppResult;
use sb_common::money::AMOUNT_TOO_LARGE;
use sb_common::totals::{line_totals, validate_line_item};
use sb_common::types::{InvoiceTemplate, RecurringFrequency, RecurringInvoiceRecord};
use sb_common::validation::ValidationErrors;
use serde::Deserialize;

use super::{parse_enum, parse_id};
use crate::services::recurring::RecurringService;
use crate::state::AppState;
use crate::stores::project::ProjectStore;
use crate::stores::recurring::{NewRecurring, RecurringStore};

#[derive(Debug, Default, Deserialize)]
pub struct RecurringQuery {
    pub project_id: Option<String>,
}

fn parse_frequency(raw: &str) -> AppResult<RecurringFrequency> {
    parse_enum(
        "frequency",
        raw,
        RecurringFrequency::parse,
        RecurringFrequency::expected(),
    )
}

fn validate_template(template: &InvoiceTemplate) -> AppResult<()> {
    let mut errors = ValidationErrors::new();
    let lines: Vec<LineItemInput> = template
        .line_items
        .iter()
        .map(|line| LineItemInput {
            description: line.description.clone(),
            quantity: line.quantity,
            rate: line.rate,
            tax: line.tax,
        })
        .collect();
    for (index, line) in lines.iter().enumerate() {
        validate_line_item(&mut errors, &format!("template.line_items[{index}]."), line);
    }
    if errors.is_empty() && line_totals(&lines).is_none() {
        errors.push("template.line_items", AMOUNT_TOO_LARGE);
    }
    Ok(errors.into_result(())?)
}

pub async fn list(
    Query(query): Query<RecurringQuery>,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<RecurringInvoiceRecord>>> {
    let project_id = query
        .project_id
        .as_deref()
        .map(|raw| parse_id(raw, "project"))
        .transpose()?;
    let schedules = RecurringStore::new(state.db_pool.clone())
        .list(project_id)
        .await?;
    Ok(Json(schedules))
}

pub async fn get(
    Path(recurring_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Json<RecurringInvoiceRecord>> {
    let recurring_id = parse_id(&recurring_id, "recurring invoice")?;
    let schedule = RecurringStore::new(state.db_pool.clone())
        .require(recurring_id)
        .await?;
    Ok(Json(schedule))
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateRecurringRequest>,
) -> AppResult<(StatusCode, Json<RecurringInvoiceRecord>)> {
    let frequency = parse_frequency(&payload.frequency)?;
    validate_template(&payload.template)?;
    ProjectStore::new(state.db_pool.clone())
        .require(payload.project_id)
        .await?;

    let schedule = RecurringStore::new(state.db_pool.clone())
        .create(&NewRecurring {
            project_id: payload.project_id,
            frequency,
            next_issue_date: payload.next_issue_date,
            enabled: payload.enabled.unwrap_or(true),
            template: payload.template,
        })
        .await?;
    tracing::info!(
        recurring_id = %schedule.recurring_id,
        frequency = %schedule.frequency,
        next_issue_date = %schedule.next_issue_date,
        "recurring invoice scheduled"
    );
    Ok((StatusCode::CREATED, Json(schedule)))
}

pub async fn update(
    Path(recurring_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateRecurringRequest>,
) -> AppResult<Json<RecurringInvoiceRecord>> {
    let recurring_id = parse_id(&recurring_id, "recurring invoice")?;
    let store = RecurringStore::new(state.db_pool.clone());
    let mut schedule = store.require(recurring_id).await?;

    if let Some(raw) = payload.frequency.as_deref() {
        schedule.frequency = parse_frequency(raw)?;
    }
    if let Some(project_id) = payload.project_id {
        ProjectStore::new(state.db_pool.clone())
            .require(project_id)
            .await?;
        schedule.project_id = project_id;
    }
    if let Some(next_issue_date) = payload.next_issue_date {
        schedule.next_issue_date = next_issue_date;
    }
    if let Some(enabled) = payload.enabled {
        schedule.enabled = enabled;
    }
    if let Some(template) = payload.template {
        validate_template(&template)?;
        schedule.template = template;
    }

    Ok(Json(store.update(&schedule).await?))
}

pub async fn delete(
    Path(recurring_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<StatusCode> {
    let recurring_id = parse_id(&recurring_id, "recurring invoice")?;
    RecurringStore::new(state.db_pool.clone())
        .delete(recurring_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Issues the next invoice now, dated today, whether or not the schedule is
/// due or enabled.
pub async fn issue(
    Path(recurring_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<IssueResponse>)> {
    let recurring_id = parse_id(&recurring_id, "recurring invoice")?;
    let schedule = RecurringStore::new(state.db_pool.clone())
        .require(recurring_id)
        .await?;

    let issued = RecurringService::new(state.db_pool.clone(), state.default_payment_terms_days)
        .issue(&schedule, Utc::now().date_naive())
        .await?;
    Ok((StatusCode::CREATED, Json(issued)))
}
