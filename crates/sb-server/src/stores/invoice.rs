use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use sb_common::api::{DashboardStats, InvoiceWithLineItems, LineItemInput};
use sb_common::error::{AppError, AppResult};
use sb_common::money::AMOUNT_TOO_LARGE;
use sb_common::schedule::invoice_number;
use sb_common::totals::{invoice_totals, line_amount, InvoiceTotals};
use sb_common::types::{InvoiceRecord, InvoiceStatus, LineItemRecord};
use sb_common::validation::ValidationErrors;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::db;

const INVOICE_COLUMNS: &str = "invoice_id, invoice_number, project_id, subtotal, tax, total, status, \
     notes, issue_date, due_date, paid_date, created_at";
const LINE_ITEM_COLUMNS: &str = "line_item_id, invoice_id, description, quantity, rate, tax, amount";

#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoice {
    pub project_id: Uuid,
    /// Generated as `INV-{year}-{NNNN}` when absent.
    pub invoice_number: Option<String>,
    pub status: InvoiceStatus,
    pub notes: Option<String>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub line_items: Vec<LineItemInput>,
}

#[derive(Clone)]
pub struct InvoiceStore {
    pool: SqlitePool,
}

impl InvoiceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, invoice: &NewInvoice) -> AppResult<InvoiceWithLineItems> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db::write_error("failed to begin transaction", e))?;
        let created = insert_invoice(&mut tx, invoice).await?;
        tx.commit()
            .await
            .map_err(|e| db::write_error("failed to commit invoice", e))?;
        Ok(created)
    }

    pub async fn get(&self, invoice_id: Uuid) -> AppResult<Option<InvoiceRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_id = ?1"
        ))
        .bind(invoice_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db::read_error("failed to fetch invoice", e))?;

        row.as_ref().map(row_to_invoice).transpose()
    }

    pub async fn require(&self, invoice_id: Uuid) -> AppResult<InvoiceRecord> {
        self.get(invoice_id)
            .await?
            .ok_or_else(|| AppError::not_found("invoice"))
    }

    pub async fn with_line_items(&self, invoice_id: Uuid) -> AppResult<InvoiceWithLineItems> {
        let invoice = self.require(invoice_id).await?;
        let line_items = self.list_line_items(invoice_id).await?;
        Ok(InvoiceWithLineItems {
            invoice,
            line_items,
        })
    }

    pub async fn list(
        &self,
        project_id: Option<Uuid>,
        status: Option<InvoiceStatus>,
    ) -> AppResult<Vec<InvoiceRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices \
             WHERE (?1 IS NULL OR project_id = ?1) AND (?2 IS NULL OR status = ?2) \
             ORDER BY issue_date DESC, created_at DESC"
        ))
        .bind(project_id.map(|id| id.to_string()))
        .bind(status.map(InvoiceStatus::as_str))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db::read_error("failed to list invoices", e))?;

        rows.iter().map(row_to_invoice).collect()
    }

    /// Writes the editable header fields. Totals are owned by the line items
    /// and are left alone.
    pub async fn update(&self, invoice: &InvoiceRecord) -> AppResult<InvoiceRecord> {
        let result = sqlx::query(
            "UPDATE invoices SET invoice_number = ?2, project_id = ?3, status = ?4, notes = ?5, \
             issue_date = ?6, due_date = ?7, paid_date = ?8 WHERE invoice_id = ?1",
        )
        .bind(invoice.invoice_id.to_string())
        .bind(&invoice.invoice_number)
        .bind(invoice.project_id.to_string())
        .bind(invoice.status.as_str())
        .bind(invoice.notes.as_deref())
        .bind(db::date_text(invoice.issue_date))
        .bind(db::date_text(invoice.due_date))
        .bind(invoice.paid_date.map(db::date_text))
        .execute(&self.pool)
        .await
        .map_err(|e| db::write_error("failed to update invoice", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("invoice"));
        }
        self.require(invoice.invoice_id).await
    }

    /// Line items go with the invoice. An invoice with a recorded split
    /// cannot be deleted.
    pub async fn delete(&self, invoice_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM invoices WHERE invoice_id = ?1")
            .bind(invoice_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| db::write_error("failed to delete invoice", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("invoice"));
        }
        Ok(())
    }

    pub async fn list_line_items(&self, invoice_id: Uuid) -> AppResult<Vec<LineItemRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {LINE_ITEM_COLUMNS} FROM line_items WHERE invoice_id = ?1 \
             ORDER BY created_at, rowid"
        ))
        .bind(invoice_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db::read_error("failed to list line items", e))?;

        rows.iter().map(row_to_line_item).collect()
    }

    pub async fn get_line_item(&self, line_item_id: Uuid) -> AppResult<Option<LineItemRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {LINE_ITEM_COLUMNS} FROM line_items WHERE line_item_id = ?1"
        ))
        .bind(line_item_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db::read_error("failed to fetch line item", e))?;

        row.as_ref().map(row_to_line_item).transpose()
    }

    pub async fn require_line_item(&self, line_item_id: Uuid) -> AppResult<LineItemRecord> {
        self.get_line_item(line_item_id)
            .await?
            .ok_or_else(|| AppError::not_found("line item"))
    }

    pub async fn add_line_item(
        &self,
        invoice_id: Uuid,
        line: &LineItemInput,
    ) -> AppResult<LineItemRecord> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db::write_error("failed to begin transaction", e))?;
        let record = insert_line_item(&mut tx, invoice_id, line).await?;
        recompute_totals(&mut tx, invoice_id).await?;
        tx.commit()
            .await
            .map_err(|e| db::write_error("failed to commit line item", e))?;
        Ok(record)
    }

    pub async fn update_line_item(
        &self,
        line_item_id: Uuid,
        line: &LineItemInput,
    ) -> AppResult<LineItemRecord> {
        let current = self.require_line_item(line_item_id).await?;
        let amount = amount_of(line)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db::write_error("failed to begin transaction", e))?;
        sqlx::query(
            "UPDATE line_items SET description = ?2, quantity = ?3, rate = ?4, tax = ?5, amount = ?6 \
             WHERE line_item_id = ?1",
        )
        .bind(line_item_id.to_string())
        .bind(line.description.trim())
        .bind(line.quantity.to_string())
        .bind(line.rate.to_string())
        .bind(line.tax.map(|t| t.to_string()))
        .bind(amount.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| db::write_error("failed to update line item", e))?;
        recompute_totals(&mut tx, current.invoice_id).await?;
        tx.commit()
            .await
            .map_err(|e| db::write_error("failed to commit line item", e))?;

        Ok(LineItemRecord {
            line_item_id,
            invoice_id: current.invoice_id,
            description: line.description.trim().to_string(),
            quantity: line.quantity,
            rate: line.rate,
            tax: line.tax,
            amount,
        })
    }

    pub async fn delete_line_item(&self, line_item_id: Uuid) -> AppResult<()> {
        let current = self.require_line_item(line_item_id).await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db::write_error("failed to begin transaction", e))?;
        sqlx::query("DELETE FROM line_items WHERE line_item_id = ?1")
            .bind(line_item_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| db::write_error("failed to delete line item", e))?;
        recompute_totals(&mut tx, current.invoice_id).await?;
        tx.commit()
            .await
            .map_err(|e| db::write_error("failed to commit line item delete", e))?;
        Ok(())
    }

    /// Moves `sent` invoices whose due date is before `today` to `overdue`.
    pub async fn mark_overdue(&self, today: NaiveDate) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE invoices SET status = 'overdue' WHERE status = 'sent' AND due_date < ?1",
        )
        .bind(db::date_text(today))
        .execute(&self.pool)
        .await
        .map_err(|e| db::write_error("failed to mark overdue invoices", e))?;
        Ok(result.rows_affected())
    }

    /// Paid invoices count as revenue and sent ones as pending. Sums are
    /// taken in `Decimal` since amounts are stored as text, and saturate at
    /// `Decimal::MAX`.
    pub async fn dashboard_stats(&self) -> AppResult<DashboardStats> {
        let rows = sqlx::query("SELECT status, total FROM invoices")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db::read_error("failed to load invoice totals", e))?;

        let mut stats = DashboardStats::default();
        for row in &rows {
            let status = db::text_enum(row, "status", InvoiceStatus::parse)?;
            let total = db::decimal(row, "total")?;
            match status {
                InvoiceStatus::Paid => {
                    stats.paid_amount = stats.paid_amount.saturating_add(total);
                    stats.paid_count += 1;
                }
                InvoiceStatus::Sent => {
                    stats.pending_amount = stats.pending_amount.saturating_add(total);
                    stats.pending_count += 1;
                }
                InvoiceStatus::Overdue => {
                    stats.overdue_amount = stats.overdue_amount.saturating_add(total);
                    stats.overdue_count += 1;
                }
                InvoiceStatus::Draft => {}
            }
        }
        stats.total_revenue = stats.paid_amount;
        Ok(stats)
    }
}

/// Inserts an invoice and its line items on `conn` with totals computed from
/// the lines.
pub async fn insert_invoice(
    conn: &mut SqliteConnection,
    invoice: &NewInvoice,
) -> AppResult<InvoiceWithLineItems> {
    let invoice_id = Uuid::new_v4();
    let number = match &invoice.invoice_number {
        Some(number) => number.trim().to_string(),
        None => next_invoice_number(conn, invoice.issue_date).await?,
    };
    let mut lines = Vec::with_capacity(invoice.line_items.len());
    for line in &invoice.line_items {
        lines.push((amount_of(line)?, line.tax));
    }
    let totals = totals_of(lines)?;

    sqlx::query(
        "INSERT INTO invoices (invoice_id, invoice_number, project_id, subtotal, tax, total, status, \
         notes, issue_date, due_date, paid_date, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )
    .bind(invoice_id.to_string())
    .bind(&number)
    .bind(invoice.project_id.to_string())
    .bind(totals.subtotal.to_string())
    .bind(totals.tax.to_string())
    .bind(totals.total.to_string())
    .bind(invoice.status.as_str())
    .bind(invoice.notes.as_deref())
    .bind(db::date_text(invoice.issue_date))
    .bind(db::date_text(invoice.due_date))
    .bind(invoice.paid_date.map(db::date_text))
    .bind(db::now_timestamp())
    .execute(&mut *conn)
    .await
    .map_err(|e| db::write_error("failed to create invoice", e))?;

    let mut line_items = Vec::with_capacity(invoice.line_items.len());
    for line in &invoice.line_items {
        line_items.push(insert_line_item(conn, invoice_id, line).await?);
    }

    let row = sqlx::query(&format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_id = ?1"
    ))
    .bind(invoice_id.to_string())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| db::read_error("failed to fetch invoice", e))?;

    Ok(InvoiceWithLineItems {
        invoice: row_to_invoice(&row)?,
        line_items,
    })
}

async fn insert_line_item(
    conn: &mut SqliteConnection,
    invoice_id: Uuid,
    line: &LineItemInput,
) -> AppResult<LineItemRecord> {
    let line_item_id = Uuid::new_v4();
    let amount = amount_of(line)?;
    sqlx::query(
        "INSERT INTO line_items (line_item_id, invoice_id, description, quantity, rate, tax, amount, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .bind(line_item_id.to_string())
    .bind(invoice_id.to_string())
    .bind(line.description.trim())
    .bind(line.quantity.to_string())
    .bind(line.rate.to_string())
    .bind(line.tax.map(|t| t.to_string()))
    .bind(amount.to_string())
    .bind(db::now_timestamp())
    .execute(&mut *conn)
    .await
    .map_err(|e| db::write_error("failed to create line item", e))?;

    Ok(LineItemRecord {
        line_item_id,
        invoice_id,
        description: line.description.trim().to_string(),
        quantity: line.quantity,
        rate: line.rate,
        tax: line.tax,
        amount,
    })
}

fn amount_of(line: &LineItemInput) -> AppResult<Decimal> {
    line_amount(line.quantity, line.rate)
        .ok_or_else(|| ValidationErrors::single("amount", AMOUNT_TOO_LARGE).into())
}

/// Totals that would not fit are rejected as a validation failure; the
/// caller's transaction is dropped with them.
fn totals_of(lines: Vec<(Decimal, Option<Decimal>)>) -> AppResult<InvoiceTotals> {
    invoice_totals(lines)
        .ok_or_else(|| ValidationErrors::single("line_items", AMOUNT_TOO_LARGE).into())
}

async fn recompute_totals(conn: &mut SqliteConnection, invoice_id: Uuid) -> AppResult<InvoiceTotals> {
    let rows = sqlx::query("SELECT amount, tax FROM line_items WHERE invoice_id = ?1")
        .bind(invoice_id.to_string())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| db::read_error("failed to load line items", e))?;

    let mut lines = Vec::with_capacity(rows.len());
    for row in &rows {
        lines.push((db::decimal(row, "amount")?, db::opt_decimal(row, "tax")?));
    }
    let totals = totals_of(lines)?;

    let result = sqlx::query(
        "UPDATE invoices SET subtotal = ?2, tax = ?3, total = ?4 WHERE invoice_id = ?1",
    )
    .bind(invoice_id.to_string())
    .bind(totals.subtotal.to_string())
    .bind(totals.tax.to_string())
    .bind(totals.total.to_string())
    .execute(&mut *conn)
    .await
    .map_err(|e| db::write_error("failed to update invoice totals", e))?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("invoice"));
    }
    Ok(totals)
}

async fn next_invoice_number(conn: &mut SqliteConnection, issue_date: NaiveDate) -> AppResult<String> {
    let prefix = format!("INV-{}-", issue_date.year());
    let rows = sqlx::query("SELECT invoice_number FROM invoices WHERE invoice_number LIKE ?1")
        .bind(format!("{prefix}%"))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| db::read_error("failed to scan invoice numbers", e))?;

    let mut highest = 0u32;
    for row in &rows {
        let number: String = row
            .try_get("invoice_number")
            .map_err(|e| AppError::External(format!("read invoice_number failed: {e}")))?;
        if let Some(seq) = number
            .strip_prefix(&prefix)
            .and_then(|rest| rest.parse::<u32>().ok())
        {
            highest = highest.max(seq);
        }
    }
    Ok(invoice_number(issue_date, highest + 1))
}

fn row_to_invoice(row: &SqliteRow) -> AppResult<InvoiceRecord> {
    Ok(InvoiceRecord {
        invoice_id: db::uuid(row, "invoice_id")?,
        invoice_number: db::string(row, "invoice_number")?,
        project_id: db::uuid(row, "project_id")?,
        subtotal: db::decimal(row, "subtotal")?,
        tax: db::decimal(row, "tax")?,
        total: db::decimal(row, "total")?,
        status: db::text_enum(row, "status", InvoiceStatus::parse)?,
        notes: db::opt_string(row, "notes")?,
        issue_date: db::date(row, "issue_date")?,
        due_date: db::date(row, "due_date")?,
        paid_date: db::opt_date(row, "paid_date")?,
        created_at: db::timestamp(row, "created_at")?,
    })
}

fn row_to_line_item(row: &SqliteRow) -> AppResult<LineItemRecord> {
    Ok(LineItemRecord {
        line_item_id: db::uuid(row, "line_item_id")?,
        invoice_id: db::uuid(row, "invoice_id")?,
        description: db::string(row, "description")?,
        quantity: db::decimal(row, "quantity")?,
        rate: db::decimal(row, "rate")?,
        tax: db::opt_decimal(row, "tax")?,
        amount: db::decimal(row, "amount")?,
    })
}
