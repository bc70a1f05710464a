use chrono::NaiveDate;
use sb_common::error::{AppError, AppResult};
use sb_common::types::{InvoiceTemplate, RecurringFrequency, RecurringInvoiceRecord};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::db;

const RECURRING_COLUMNS: &str = "recurring_id, project_id, frequency, next_issue_date, enabled, \
     last_invoice_id, template, created_at";

#[derive(Debug, Clone, PartialEq)]
pub struct NewRecurring {
    pub project_id: Uuid,
    pub frequency: RecurringFrequency,
    pub next_issue_date: NaiveDate,
    pub enabled: bool,
    pub template: InvoiceTemplate,
}

#[derive(Clone)]
pub struct RecurringStore {
    pool: SqlitePool,
}

impl RecurringStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, schedule: &NewRecurring) -> AppResult<RecurringInvoiceRecord> {
        let recurring_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO recurring_invoices \
             (recurring_id, project_id, frequency, next_issue_date, enabled, template, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(recurring_id.to_string())
        .bind(schedule.project_id.to_string())
        .bind(schedule.frequency.as_str())
        .bind(db::date_text(schedule.next_issue_date))
        .bind(schedule.enabled)
        .bind(template_text(&schedule.template)?)
        .bind(db::now_timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| db::write_error("failed to create recurring invoice", e))?;

        self.require(recurring_id).await
    }

    pub async fn get(&self, recurring_id: Uuid) -> AppResult<Option<RecurringInvoiceRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECURRING_COLUMNS} FROM recurring_invoices WHERE recurring_id = ?1"
        ))
        .bind(recurring_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db::read_error("failed to fetch recurring invoice", e))?;

        row.as_ref().map(row_to_recurring).transpose()
    }

    pub async fn require(&self, recurring_id: Uuid) -> AppResult<RecurringInvoiceRecord> {
        self.get(recurring_id)
            .await?
            .ok_or_else(|| AppError::not_found("recurring invoice"))
    }

    pub async fn list(&self, project_id: Option<Uuid>) -> AppResult<Vec<RecurringInvoiceRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECURRING_COLUMNS} FROM recurring_invoices \
             WHERE ?1 IS NULL OR project_id = ?1 ORDER BY next_issue_date, created_at"
        ))
        .bind(project_id.map(|id| id.to_string()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db::read_error("failed to list recurring invoices", e))?;

        rows.iter().map(row_to_recurring).collect()
    }

    /// Enabled schedules whose next issue date is on or before `today`.
    pub async fn list_due(&self, today: NaiveDate) -> AppResult<Vec<RecurringInvoiceRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECURRING_COLUMNS} FROM recurring_invoices \
             WHERE enabled = 1 AND next_issue_date <= ?1 ORDER BY next_issue_date, created_at"
        ))
        .bind(db::date_text(today))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db::read_error("failed to list due recurring invoices", e))?;

        rows.iter().map(row_to_recurring).collect()
    }

    pub async fn update(
        &self,
        schedule: &RecurringInvoiceRecord,
    ) -> AppResult<RecurringInvoiceRecord> {
        let result = sqlx::query(
            "UPDATE recurring_invoices SET project_id = ?2, frequency = ?3, next_issue_date = ?4, \
             enabled = ?5, template = ?6 WHERE recurring_id = ?1",
        )
        .bind(schedule.recurring_id.to_string())
        .bind(schedule.project_id.to_string())
        .bind(schedule.frequency.as_str())
        .bind(db::date_text(schedule.next_issue_date))
        .bind(schedule.enabled)
        .bind(template_text(&schedule.template)?)
        .execute(&self.pool)
        .await
        .map_err(|e| db::write_error("failed to update recurring invoice", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("recurring invoice"));
        }
        self.require(schedule.recurring_id).await
    }

    pub async fn delete(&self, recurring_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM recurring_invoices WHERE recurring_id = ?1")
            .bind(recurring_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| db::write_error("failed to delete recurring invoice", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("recurring invoice"));
        }
        Ok(())
    }
}

/// Records an issued invoice and moves the schedule from `issued_for` to
/// `next_issue_date`, on `conn`. Fails with `Conflict` when the schedule no
/// longer sits at `issued_for`, which means that period was already issued.
pub async fn record_issue(
    conn: &mut SqliteConnection,
    recurring_id: Uuid,
    invoice_id: Uuid,
    issued_for: NaiveDate,
    next_issue_date: NaiveDate,
) -> AppResult<()> {
    let result = sqlx::query(
        "UPDATE recurring_invoices SET last_invoice_id = ?2, next_issue_date = ?3 \
         WHERE recurring_id = ?1 AND next_issue_date = ?4",
    )
    .bind(recurring_id.to_string())
    .bind(invoice_id.to_string())
    .bind(db::date_text(next_issue_date))
    .bind(db::date_text(issued_for))
    .execute(&mut *conn)
    .await
    .map_err(|e| db::write_error("failed to advance recurring invoice", e))?;

    if result.rows_affected() > 0 {
        return Ok(());
    }

    let exists = sqlx::query("SELECT 1 FROM recurring_invoices WHERE recurring_id = ?1")
        .bind(recurring_id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| db::read_error("failed to load recurring invoice", e))?;
    match exists {
        Some(_) => Err(AppError::Conflict(format!(
            "recurring invoice {recurring_id} was already issued for {issued_for}"
        ))),
        None => Err(AppError::not_found("recurring invoice")),
    }
}

fn template_text(template: &InvoiceTemplate) -> AppResult<String> {
    serde_json::to_string(template)
        .map_err(|e| AppError::InvalidInput(format!("template serialize failed: {e}")))
}

fn row_to_recurring(row: &SqliteRow) -> AppResult<RecurringInvoiceRecord> {
    let template = db::string(row, "template")?;
    let enabled: bool = row
        .try_get("enabled")
        .map_err(|e| AppError::External(format!("read enabled failed: {e}")))?;

    Ok(RecurringInvoiceRecord {
        recurring_id: db::uuid(row, "recurring_id")?,
        project_id: db::uuid(row, "project_id")?,
        frequency: db::text_enum(row, "frequency", RecurringFrequency::parse)?,
        next_issue_date: db::date(row, "next_issue_date")?,
        enabled,
        last_invoice_id: db::opt_uuid(row, "last_invoice_id")?,
        template: serde_json::from_str(&template)
            .map_err(|e| AppError::External(format!("invalid stored template: {e}")))?,
        created_at: db::timestamp(row, "created_at")?,
    })
}
