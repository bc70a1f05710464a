use std::time::Duration;

use chrono::{NaiveDate, Utc};
use sb_common::error::AppResult;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time;

use crate::services::recurring::RecurringService;
use crate::state::AppState;
use crate::stores::invoice::InvoiceStore;
use crate::stores::session::SessionStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub invoices_issued: usize,
    pub invoices_overdue: u64,
    pub sessions_purged: u64,
}

/// One pass: issue due recurring invoices, flag overdue ones, and drop
/// expired admin sessions.
pub async fn run_sweep(state: &AppState, today: NaiveDate) -> AppResult<SweepReport> {
    let recurring =
        RecurringService::new(state.db_pool.clone(), state.default_payment_terms_days);
    let issued = recurring.issue_due(today).await?;
    let overdue = InvoiceStore::new(state.db_pool.clone())
        .mark_overdue(today)
        .await?;
    let purged = SessionStore::new(state.db_pool.clone())
        .delete_expired(Utc::now())
        .await?;

    Ok(SweepReport {
        invoices_issued: issued.len(),
        invoices_overdue: overdue,
        sessions_purged: purged,
    })
}

pub fn spawn(state: AppState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(every);
        loop {
            ticker.tick().await;
            let today = Utc::now().date_naive();
            match run_sweep(&state, today).await {
                Ok(report) if report != SweepReport::default() => {
                    tracing::info!(
                        issued = report.invoices_issued,
                        overdue = report.invoices_overdue,
                        sessions_purged = report.sessions_purged,
                        "sweep complete"
                    );
                }
                Ok(_) => tracing::debug!("sweep found nothing to do"),
                Err(err) => tracing::error!(error = %err, "sweep failed"),
            }
        }
    })
}
