use chrono::NaiveDate;
use sb_common::api::{IssueResponse, LineItemInput};
use sb_common::error::{AppError, AppResult};
use sb_common::schedule::{advance, due_date};
use sb_common::types::{InvoiceStatus, RecurringInvoiceRecord};
use sqlx::SqlitePool;

use crate::db;
use crate::stores::invoice::{insert_invoice, NewInvoice};
use crate::stores::recurring::{record_issue, RecurringStore};

#[derive(Clone)]
pub struct RecurringService {
    pool: SqlitePool,
    default_payment_terms_days: u32,
}

impl RecurringService {
    pub fn new(pool: SqlitePool, default_payment_terms_days: u32) -> Self {
        Self {
            pool,
            default_payment_terms_days,
        }
    }

    /// Issues one draft invoice from the schedule's template, dated
    /// `issue_date`, and advances the schedule by one period. Both writes
    /// share a transaction, and a `schedule` that has already been advanced
    /// elsewhere is rejected with `Conflict` without issuing anything.
    pub async fn issue(
        &self,
        schedule: &RecurringInvoiceRecord,
        issue_date: NaiveDate,
    ) -> AppResult<IssueResponse> {
        let terms = schedule
            .template
            .payment_terms_days
            .unwrap_or(self.default_payment_terms_days);
        let next_issue_date = advance(schedule.next_issue_date, schedule.frequency)
            .ok_or_else(|| AppError::InvalidInput("next issue date out of range".to_string()))?;
        let invoice = NewInvoice {
            project_id: schedule.project_id,
            invoice_number: None,
            status: InvoiceStatus::Draft,
            notes: schedule.template.notes.clone(),
            issue_date,
            due_date: due_date(issue_date, terms)
                .ok_or_else(|| AppError::InvalidInput("due date out of range".to_string()))?,
            paid_date: None,
            line_items: schedule
                .template
                .line_items
                .iter()
                .map(|line| LineItemInput {
                    description: line.description.clone(),
                    quantity: line.quantity,
                    rate: line.rate,
                    tax: line.tax,
                })
                .collect(),
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db::write_error("failed to begin transaction", e))?;
        let created = insert_invoice(&mut tx, &invoice).await?;
        record_issue(
            &mut tx,
            schedule.recurring_id,
            created.invoice.invoice_id,
            schedule.next_issue_date,
            next_issue_date,
        )
        .await?;
        tx.commit()
            .await
            .map_err(|e| db::write_error("failed to commit recurring issue", e))?;

        tracing::info!(
            recurring_id = %schedule.recurring_id,
            invoice_id = %created.invoice.invoice_id,
            invoice_number = %created.invoice.invoice_number,
            next_issue_date = %next_issue_date,
            "issued recurring invoice"
        );

        Ok(IssueResponse {
            recurring_id: schedule.recurring_id,
            invoice_id: created.invoice.invoice_id,
            next_issue_date,
        })
    }

    /// Issues one invoice for every due schedule. A schedule that is
    /// several periods behind catches up one period per call. Failures are
    /// logged and do not stop the remaining schedules.
    pub async fn issue_due(&self, today: NaiveDate) -> AppResult<Vec<IssueResponse>> {
        let due = RecurringStore::new(self.pool.clone())
            .list_due(today)
            .await?;

        let mut issued = Vec::with_capacity(due.len());
        for schedule in &due {
            match self.issue(schedule, schedule.next_issue_date).await {
                Ok(response) => issued.push(response),
                Err(err) => tracing::warn!(
                    recurring_id = %schedule.recurring_id,
                    error = %err,
                    "failed to issue recurring invoice"
                ),
            }
        }
        Ok(issued)
    }
}
