use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use sb_common::api::{
    CreateInvoiceRequest, InvoiceWithLineItems, LineItemInput, UpdateInvoiceRequest,
    UpdateLineItemRequest,
};
use sb_common::document::InvoiceDocument;
use sb_common::error::{AppError, AppResult};
use sb_common::schedule;
use sb_common::totals::{validate_line_item, validate_line_items};
use sb_common::types::{InvoiceRecord, InvoiceStatus, LineItemRecord};
use sb_common::validation::ValidationErrors;
use serde::Deserialize;

use super::{parse_enum, parse_id};
use crate::state::AppState;
use crate::stores::client::ClientStore;
use crate::stores::invoice::{InvoiceStore, NewInvoice};
use crate::stores::project::ProjectStore;

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceQuery {
    pub project_id: Option<String>,
    pub status: Option<String>,
}

fn parse_status(raw: &str) -> AppResult<InvoiceStatus> {
    parse_enum("status", raw, InvoiceStatus::parse, InvoiceStatus::expected())
}

fn check_dates(errors: &mut ValidationErrors, issue_date: NaiveDate, due_date: NaiveDate) {
    if due_date < issue_date {
        errors.push(
            "due_date",
            format!("must not be before issue_date {issue_date}"),
        );
    }
}

pub async fn list(
    Query(query): Query<InvoiceQuery>,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<InvoiceRecord>>> {
    let project_id = query
        .project_id
        .as_deref()
        .map(|raw| parse_id(raw, "project"))
        .transpose()?;
    let status = query.status.as_deref().map(parse_status).transpose()?;

    let invoices = InvoiceStore::new(state.db_pool.clone())
        .list(project_id, status)
        .await?;
    Ok(Json(invoices))
}

pub async fn list_for_project(
    Path(project_id): Path<String>,
    Query(query): Query<InvoiceQuery>,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<InvoiceRecord>>> {
    let project_id = parse_id(&project_id, "project")?;
    let status = query.status.as_deref().map(parse_status).transpose()?;

    ProjectStore::new(state.db_pool.clone())
        .require(project_id)
        .await?;
    let invoices = InvoiceStore::new(state.db_pool.clone())
        .list(Some(project_id), status)
        .await?;
    Ok(Json(invoices))
}

pub async fn get(
    Path(invoice_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Json<InvoiceWithLineItems>> {
    let invoice_id = parse_id(&invoice_id, "invoice")?;
    let invoice = InvoiceStore::new(state.db_pool.clone())
        .with_line_items(invoice_id)
        .await?;
    Ok(Json(invoice))
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateInvoiceRequest>,
) -> AppResult<(StatusCode, Json<InvoiceWithLineItems>)> {
    let today = Utc::now().date_naive();
    let status = match payload.status.as_deref() {
        Some(raw) => parse_status(raw)?,
        None => InvoiceStatus::Draft,
    };
    let issue_date = payload.issue_date.unwrap_or(today);
    let due_date = match payload.due_date {
        Some(due_date) => due_date,
        None => schedule::due_date(issue_date, state.default_payment_terms_days)
            .ok_or_else(|| AppError::InvalidInput("issue_date is out of range".to_string()))?,
    };

    let mut errors = validate_line_items(&payload.line_items);
    if let Some(number) = &payload.invoice_number {
        errors.require_non_blank("invoice_number", number);
    }
    check_dates(&mut errors, issue_date, due_date);
    errors.into_result(())?;

    ProjectStore::new(state.db_pool.clone())
        .require(payload.project_id)
        .await?;

    let created = InvoiceStore::new(state.db_pool.clone())
        .create(&NewInvoice {
            project_id: payload.project_id,
            invoice_number: payload.invoice_number.map(|n| n.trim().to_string()),
            status,
            notes: payload.notes,
            issue_date,
            due_date,
            paid_date: (status == InvoiceStatus::Paid).then_some(today),
            line_items: payload.line_items,
        })
        .await?;
    tracing::info!(
        invoice_id = %created.invoice.invoice_id,
        invoice_number = %created.invoice.invoice_number,
        total = %created.invoice.total,
        "invoice created"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    Path(invoice_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateInvoiceRequest>,
) -> AppResult<Json<InvoiceRecord>> {
    let invoice_id = parse_id(&invoice_id, "invoice")?;
    let store = InvoiceStore::new(state.db_pool.clone());
    let mut invoice = store.require(invoice_id).await?;

    if let Some(raw) = payload.status.as_deref() {
        invoice.status = parse_status(raw)?;
    }
    if let Some(project_id) = payload.project_id {
        ProjectStore::new(state.db_pool.clone())
            .require(project_id)
            .await?;
        invoice.project_id = project_id;
    }

    let mut errors = ValidationErrors::new();
    if let Some(number) = payload.invoice_number {
        errors.require_non_blank("invoice_number", &number);
        invoice.invoice_number = number.trim().to_string();
    }
    if payload.notes.is_some() {
        invoice.notes = payload.notes;
    }
    if let Some(issue_date) = payload.issue_date {
        invoice.issue_date = issue_date;
    }
    if let Some(due_date) = payload.due_date {
        invoice.due_date = due_date;
    }
    if payload.paid_date.is_some() {
        invoice.paid_date = payload.paid_date;
    }
    if invoice.status == InvoiceStatus::Paid && invoice.paid_date.is_none() {
        invoice.paid_date = Some(Utc::now().date_naive());
    }
    check_dates(&mut errors, invoice.issue_date, invoice.due_date);
    errors.into_result(())?;

    let invoice = store.update(&invoice).await?;
    tracing::info!(invoice_id = %invoice.invoice_id, status = %invoice.status, "invoice updated");
    Ok(Json(invoice))
}

pub async fn delete(
    Path(invoice_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<StatusCode> {
    let invoice_id = parse_id(&invoice_id, "invoice")?;
    InvoiceStore::new(state.db_pool.clone())
        .delete(invoice_id)
        .await?;
    tracing::info!(invoice_id = %invoice_id, "invoice deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// The printable view: bill-to block, lines and totals at cent precision.
pub async fn document(
    Path(invoice_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Json<InvoiceDocument>> {
    let invoice_id = parse_id(&invoice_id, "invoice")?;
    let invoices = InvoiceStore::new(state.db_pool.clone());
    let invoice = invoices.require(invoice_id).await?;
    let line_items = invoices.list_line_items(invoice_id).await?;
    let project = ProjectStore::new(state.db_pool.clone())
        .require(invoice.project_id)
        .await?;
    let client = ClientStore::new(state.db_pool.clone())
        .require(project.client_id)
        .await?;

    Ok(Json(InvoiceDocument::build(
        &invoice,
        &client,
        &project,
        &line_items,
    )))
}

pub async fn list_line_items(
    Path(invoice_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<LineItemRecord>>> {
    let invoice_id = parse_id(&invoice_id, "invoice")?;
    let store = InvoiceStore::new(state.db_pool.clone());
    store.require(invoice_id).await?;
    Ok(Json(store.list_line_items(invoice_id).await?))
}

pub async fn add_line_item(
    Path(invoice_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<LineItemInput>,
) -> AppResult<(StatusCode, Json<LineItemRecord>)> {
    let invoice_id = parse_id(&invoice_id, "invoice")?;
    let mut errors = ValidationErrors::new();
    validate_line_item(&mut errors, "", &payload);
    errors.into_result(())?;

    let store = InvoiceStore::new(state.db_pool.clone());
    store.require(invoice_id).await?;
    let record = store.add_line_item(invoice_id, &payload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_line_item(
    Path(line_item_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateLineItemRequest>,
) -> AppResult<Json<LineItemRecord>> {
    let line_item_id = parse_id(&line_item_id, "line item")?;
    let store = InvoiceStore::new(state.db_pool.clone());
    let current = store.require_line_item(line_item_id).await?;

    let merged = LineItemInput {
        description: payload.description.unwrap_or(current.description),
        quantity: payload.quantity.unwrap_or(current.quantity),
        rate: payload.rate.unwrap_or(current.rate),
        tax: payload.tax.or(current.tax),
    };
    let mut errors = ValidationErrors::new();
    validate_line_item(&mut errors, "", &merged);
    errors.into_result(())?;

    Ok(Json(store.update_line_item(line_item_id, &merged).await?))
}

pub async fn delete_line_item(
    Path(line_item_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<StatusCode> {
    let line_item_id = parse_id(&line_item_id, "line item")?;
    InvoiceStore::new(state.db_pool.clone())
        .delete_line_item(line_item_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
