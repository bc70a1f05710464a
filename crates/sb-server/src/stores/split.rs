use rust_decimal::Decimal;
use sb_common::api::CreateSplitResponse;
use sb_common::error::{AppError, AppResult};
use sb_common::split::{AgentCommission, SplitOutcome};
use sb_common::types::SplitSummaryRecord;
use sqlx::sqlite::SqliteRow;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::stores::project::{insert_team_member, upsert_commission, NewTeamMember};

const SPLIT_COLUMNS: &str = "split_id, project_id, invoice_id, total_amount, team_total, commission, \
     company_profit, company_profit_percentage, created_at";

/// Everything written when a split is recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSplit {
    pub project_id: Uuid,
    pub invoice_id: Uuid,
    /// Already rounded to cents.
    pub outcome: SplitOutcome,
    pub company_profit_percentage: Decimal,
    pub team_members: Vec<NewTeamMember>,
    pub agent: Option<AgentCommission>,
}

#[derive(Clone)]
pub struct SplitStore {
    pool: SqlitePool,
}

impl SplitStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Writes the summary, one team member row per entry and the project
    /// commission in a single transaction. A second split for the same
    /// project and invoice is a `Conflict`.
    pub async fn create(&self, split: &NewSplit) -> AppResult<CreateSplitResponse> {
        let split_id = Uuid::new_v4();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db::write_error("failed to begin transaction", e))?;

        sqlx::query(
            "INSERT INTO split_summaries (split_id, project_id, invoice_id, total_amount, team_total, \
             commission, company_profit, company_profit_percentage, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(split_id.to_string())
        .bind(split.project_id.to_string())
        .bind(split.invoice_id.to_string())
        .bind(split.outcome.total_amount.to_string())
        .bind(split.outcome.team_total.to_string())
        .bind(split.outcome.commission.to_string())
        .bind(split.outcome.company_profit.to_string())
        .bind(split.company_profit_percentage.to_string())
        .bind(db::now_timestamp())
        .execute(&mut *tx)
        .await
        .map_err(|e| db::write_error("failed to record split", e))?;

        let mut team_members = Vec::with_capacity(split.team_members.len());
        for member in &split.team_members {
            team_members
                .push(insert_team_member(&mut tx, split.project_id, Some(split_id), member).await?);
        }

        let commission = match &split.agent {
            Some(agent) => Some(
                upsert_commission(&mut tx, split.project_id, &agent.agent_name, agent.rate).await?,
            ),
            None => None,
        };

        let row = sqlx::query(&format!(
            "SELECT {SPLIT_COLUMNS} FROM split_summaries WHERE split_id = ?1"
        ))
        .bind(split_id.to_string())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db::read_error("failed to fetch split", e))?;
        let summary = row_to_split(&row)?;

        tx.commit()
            .await
            .map_err(|e| db::write_error("failed to commit split", e))?;

        Ok(CreateSplitResponse {
            summary,
            team_members,
            commission,
        })
    }

    pub async fn get(&self, split_id: Uuid) -> AppResult<Option<SplitSummaryRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SPLIT_COLUMNS} FROM split_summaries WHERE split_id = ?1"
        ))
        .bind(split_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db::read_error("failed to fetch split", e))?;

        row.as_ref().map(row_to_split).transpose()
    }

    pub async fn require(&self, split_id: Uuid) -> AppResult<SplitSummaryRecord> {
        self.get(split_id)
            .await?
            .ok_or_else(|| AppError::not_found("split"))
    }

    pub async fn find_for_invoice(
        &self,
        project_id: Uuid,
        invoice_id: Uuid,
    ) -> AppResult<Option<SplitSummaryRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SPLIT_COLUMNS} FROM split_summaries WHERE project_id = ?1 AND invoice_id = ?2"
        ))
        .bind(project_id.to_string())
        .bind(invoice_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db::read_error("failed to fetch split", e))?;

        row.as_ref().map(row_to_split).transpose()
    }

    pub async fn list(&self, project_id: Option<Uuid>) -> AppResult<Vec<SplitSummaryRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {SPLIT_COLUMNS} FROM split_summaries \
             WHERE ?1 IS NULL OR project_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(project_id.map(|id| id.to_string()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db::read_error("failed to list splits", e))?;

        rows.iter().map(row_to_split).collect()
    }
}

fn row_to_split(row: &SqliteRow) -> AppResult<SplitSummaryRecord> {
    Ok(SplitSummaryRecord {
        split_id: db::uuid(row, "split_id")?,
        project_id: db::uuid(row, "project_id")?,
        invoice_id: db::uuid(row, "invoice_id")?,
        total_amount: db::decimal(row, "total_amount")?,
        team_total: db::decimal(row, "team_total")?,
        commission: db::decimal(row, "commission")?,
        company_profit: db::decimal(row, "company_profit")?,
        company_profit_percentage: db::decimal(row, "company_profit_percentage")?,
        created_at: db::timestamp(row, "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use sb_common::api::CreateClientRequest;
    use sb_common::error::AppError;
    use sb_common::split::{compute, AgentCommission, Contribution, SplitInput};
    use sb_common::types::{ContributionType, InvoiceStatus, ProjectStatus};

    use super::{NewSplit, SplitStore};
    use crate::db::connect_in_memory;
    use crate::stores::client::ClientStore;
    use crate::stores::invoice::{InvoiceStore, NewInvoice};
    use crate::stores::project::{NewProject, NewTeamMember, ProjectStore};

    #[tokio::test]
    async fn records_split_atomically_and_once() {
        let pool = connect_in_memory().await.expect("pool");
        let client = ClientStore::new(pool.clone())
            .create(&CreateClientRequest {
                name: "Acme".to_string(),
                email: "ops@acme.test".to_string(),
                phone: None,
                company: None,
                address: None,
            })
            .await
            .expect("client");
        let projects = ProjectStore::new(pool.clone());
        let project = projects
            .create(&NewProject {
                client_id: client.client_id,
                name: "Site".to_string(),
                description: None,
                status: ProjectStatus::Active,
                deadline: None,
            })
            .await
            .expect("project");
        let day = NaiveDate::from_ymd_opt(2024, 1, 10).expect("date");
        let invoices = InvoiceStore::new(pool.clone());
        let invoice = invoices
            .create(&NewInvoice {
                project_id: project.project_id,
                invoice_number: None,
                status: InvoiceStatus::Paid,
                notes: None,
                issue_date: day,
                due_date: day,
                paid_date: Some(day),
                line_items: vec![],
            })
            .await
            .expect("invoice")
            .invoice;

        let agent = AgentCommission {
            agent_name: "Dana".to_string(),
            rate: dec!(10),
        };
        let outcome = compute(&SplitInput {
            total_amount: dec!(1000),
            team_members: vec![
                Contribution::percentage("lead", dec!(40)),
                Contribution::fixed("design", dec!(100)),
            ],
            agent: Some(agent.clone()),
            company_profit_percentage: dec!(25),
        })
        .expect("valid")
        .rounded();

        let split = NewSplit {
            project_id: project.project_id,
            invoice_id: invoice.invoice_id,
            outcome,
            company_profit_percentage: dec!(25),
            team_members: vec![
                NewTeamMember {
                    user_id: None,
                    role: Some("lead".to_string()),
                    contribution_type: ContributionType::Percentage,
                    contribution: dec!(40),
                },
                NewTeamMember {
                    user_id: None,
                    role: Some("design".to_string()),
                    contribution_type: ContributionType::Fixed,
                    contribution: dec!(100),
                },
            ],
            agent: Some(agent),
        };

        let store = SplitStore::new(pool);
        let created = store.create(&split).await.expect("create");
        assert_eq!(created.summary.team_total, dec!(500));
        assert_eq!(created.summary.company_profit, dec!(250));
        assert_eq!(created.team_members.len(), 2);
        assert_eq!(
            created.commission.as_ref().map(|c| c.rate),
            Some(dec!(10))
        );

        let members = projects
            .list_split_members(created.summary.split_id)
            .await
            .expect("members");
        assert_eq!(members.len(), 2);

        let err = store.create(&split).await.expect_err("duplicate");
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(
            projects
                .list_team_members(project.project_id)
                .await
                .expect("members")
                .len(),
            2
        );

        let err = invoices
            .delete(invoice.invoice_id)
            .await
            .expect_err("split blocks delete");
        assert!(matches!(err, AppError::Conflict(_)));

        let found = store
            .find_for_invoice(project.project_id, invoice.invoice_id)
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(found.split_id, created.summary.split_id);
    }
}
