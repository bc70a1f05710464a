use chrono::NaiveDate;
use rust_decimal::Decimal;
use sb_common::error::{AppError, AppResult};
use sb_common::types::{
    CommissionRecord, ContributionType, ProjectRecord, ProjectStatus, TeamMemberRecord,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::db;

const PROJECT_COLUMNS: &str = "project_id, client_id, name, description, status, deadline, created_at";
const MEMBER_COLUMNS: &str =
    "member_id, project_id, user_id, split_id, role, contribution_type, contribution";
const COMMISSION_COLUMNS: &str = "commission_id, project_id, agent_name, rate";

#[derive(Debug, Clone, PartialEq)]
pub struct NewProject {
    pub client_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub deadline: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTeamMember {
    pub user_id: Option<Uuid>,
    pub role: Option<String>,
    pub contribution_type: ContributionType,
    pub contribution: Decimal,
}

#[derive(Clone)]
pub struct ProjectStore {
    pool: SqlitePool,
}

impl ProjectStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, project: &NewProject) -> AppResult<ProjectRecord> {
        let project_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO projects (project_id, client_id, name, description, status, deadline, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(project_id.to_string())
        .bind(project.client_id.to_string())
        .bind(&project.name)
        .bind(project.description.as_deref())
        .bind(project.status.as_str())
        .bind(project.deadline.map(db::date_text))
        .bind(db::now_timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| db::write_error("failed to create project", e))?;

        self.require(project_id).await
    }

    pub async fn get(&self, project_id: Uuid) -> AppResult<Option<ProjectRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE project_id = ?1"
        ))
        .bind(project_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db::read_error("failed to fetch project", e))?;

        row.as_ref().map(row_to_project).transpose()
    }

    pub async fn require(&self, project_id: Uuid) -> AppResult<ProjectRecord> {
        self.get(project_id)
            .await?
            .ok_or_else(|| AppError::not_found("project"))
    }

    pub async fn list(
        &self,
        client_id: Option<Uuid>,
        status: Option<ProjectStatus>,
    ) -> AppResult<Vec<ProjectRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects \
             WHERE (?1 IS NULL OR client_id = ?1) AND (?2 IS NULL OR status = ?2) \
             ORDER BY created_at DESC"
        ))
        .bind(client_id.map(|id| id.to_string()))
        .bind(status.map(ProjectStatus::as_str))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db::read_error("failed to list projects", e))?;

        rows.iter().map(row_to_project).collect()
    }

    pub async fn update(&self, project: &ProjectRecord) -> AppResult<ProjectRecord> {
        let result = sqlx::query(
            "UPDATE projects SET client_id = ?2, name = ?3, description = ?4, status = ?5, deadline = ?6 \
             WHERE project_id = ?1",
        )
        .bind(project.project_id.to_string())
        .bind(project.client_id.to_string())
        .bind(&project.name)
        .bind(project.description.as_deref())
        .bind(project.status.as_str())
        .bind(project.deadline.map(db::date_text))
        .execute(&self.pool)
        .await
        .map_err(|e| db::write_error("failed to update project", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("project"));
        }
        self.require(project.project_id).await
    }

    /// Team members, the commission and recurring schedules go with the
    /// project. Invoices and splits block the delete.
    pub async fn delete(&self, project_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM projects WHERE project_id = ?1")
            .bind(project_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| db::write_error("failed to delete project", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("project"));
        }
        Ok(())
    }

    pub async fn list_team_members(&self, project_id: Uuid) -> AppResult<Vec<TeamMemberRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS} FROM team_members WHERE project_id = ?1 \
             ORDER BY created_at, rowid"
        ))
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db::read_error("failed to list team members", e))?;

        rows.iter().map(row_to_member).collect()
    }

    pub async fn list_split_members(&self, split_id: Uuid) -> AppResult<Vec<TeamMemberRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS} FROM team_members WHERE split_id = ?1 ORDER BY rowid"
        ))
        .bind(split_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db::read_error("failed to list split members", e))?;

        rows.iter().map(row_to_member).collect()
    }

    pub async fn add_team_member(
        &self,
        project_id: Uuid,
        member: &NewTeamMember,
    ) -> AppResult<TeamMemberRecord> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| db::read_error("failed to acquire connection", e))?;
        insert_team_member(&mut conn, project_id, None, member).await
    }

    pub async fn get_team_member(&self, member_id: Uuid) -> AppResult<Option<TeamMemberRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS} FROM team_members WHERE member_id = ?1"
        ))
        .bind(member_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db::read_error("failed to fetch team member", e))?;

        row.as_ref().map(row_to_member).transpose()
    }

    pub async fn require_team_member(&self, member_id: Uuid) -> AppResult<TeamMemberRecord> {
        self.get_team_member(member_id)
            .await?
            .ok_or_else(|| AppError::not_found("team member"))
    }

    pub async fn update_team_member(
        &self,
        member: &TeamMemberRecord,
    ) -> AppResult<TeamMemberRecord> {
        sqlx::query(
            "UPDATE team_members SET user_id = ?2, role = ?3, contribution_type = ?4, contribution = ?5 \
             WHERE member_id = ?1",
        )
        .bind(member.member_id.to_string())
        .bind(member.user_id.map(|id| id.to_string()))
        .bind(member.role.as_deref())
        .bind(member.contribution_type.as_str())
        .bind(member.contribution.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| db::write_error("failed to update team member", e))?;

        self.require_team_member(member.member_id).await
    }

    pub async fn delete_team_member(&self, member_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM team_members WHERE member_id = ?1")
            .bind(member_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| db::write_error("failed to delete team member", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("team member"));
        }
        Ok(())
    }

    pub async fn get_commission(&self, project_id: Uuid) -> AppResult<Option<CommissionRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {COMMISSION_COLUMNS} FROM commissions WHERE project_id = ?1"
        ))
        .bind(project_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db::read_error("failed to fetch commission", e))?;

        row.as_ref().map(row_to_commission).transpose()
    }

    pub async fn get_commission_by_id(
        &self,
        commission_id: Uuid,
    ) -> AppResult<Option<CommissionRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {COMMISSION_COLUMNS} FROM commissions WHERE commission_id = ?1"
        ))
        .bind(commission_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db::read_error("failed to fetch commission", e))?;

        row.as_ref().map(row_to_commission).transpose()
    }

    /// One commission per project; a second create is a `Conflict`.
    pub async fn create_commission(
        &self,
        project_id: Uuid,
        agent_name: &str,
        rate: Decimal,
    ) -> AppResult<CommissionRecord> {
        let commission_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO commissions (commission_id, project_id, agent_name, rate, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(commission_id.to_string())
        .bind(project_id.to_string())
        .bind(agent_name)
        .bind(rate.to_string())
        .bind(db::now_timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| db::write_error("failed to create commission", e))?;

        self.get_commission_by_id(commission_id)
            .await?
            .ok_or_else(|| AppError::not_found("commission"))
    }

    pub async fn update_commission(
        &self,
        commission: &CommissionRecord,
    ) -> AppResult<CommissionRecord> {
        sqlx::query("UPDATE commissions SET agent_name = ?2, rate = ?3 WHERE commission_id = ?1")
            .bind(commission.commission_id.to_string())
            .bind(&commission.agent_name)
            .bind(commission.rate.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| db::write_error("failed to update commission", e))?;

        self.get_commission_by_id(commission.commission_id)
            .await?
            .ok_or_else(|| AppError::not_found("commission"))
    }

    pub async fn delete_commission(&self, commission_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM commissions WHERE commission_id = ?1")
            .bind(commission_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| db::write_error("failed to delete commission", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("commission"));
        }
        Ok(())
    }
}

/// Inserts one team member row on `conn`, which may be inside a transaction.
pub async fn insert_team_member(
    conn: &mut SqliteConnection,
    project_id: Uuid,
    split_id: Option<Uuid>,
    member: &NewTeamMember,
) -> AppResult<TeamMemberRecord> {
    let member_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO team_members \
         (member_id, project_id, user_id, split_id, role, contribution_type, contribution, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .bind(member_id.to_string())
    .bind(project_id.to_string())
    .bind(member.user_id.map(|id| id.to_string()))
    .bind(split_id.map(|id| id.to_string()))
    .bind(member.role.as_deref())
    .bind(member.contribution_type.as_str())
    .bind(member.contribution.to_string())
    .bind(db::now_timestamp())
    .execute(&mut *conn)
    .await
    .map_err(|e| db::write_error("failed to create team member", e))?;

    Ok(TeamMemberRecord {
        member_id,
        project_id,
        user_id: member.user_id,
        split_id,
        role: member.role.clone(),
        contribution_type: member.contribution_type,
        contribution: member.contribution,
    })
}

/// Creates or replaces the project's commission on `conn`.
pub async fn upsert_commission(
    conn: &mut SqliteConnection,
    project_id: Uuid,
    agent_name: &str,
    rate: Decimal,
) -> AppResult<CommissionRecord> {
    sqlx::query(
        "INSERT INTO commissions (commission_id, project_id, agent_name, rate, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5) \
         ON CONFLICT(project_id) DO UPDATE SET agent_name = excluded.agent_name, rate = excluded.rate",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(project_id.to_string())
    .bind(agent_name)
    .bind(rate.to_string())
    .bind(db::now_timestamp())
    .execute(&mut *conn)
    .await
    .map_err(|e| db::write_error("failed to upsert commission", e))?;

    let row = sqlx::query(&format!(
        "SELECT {COMMISSION_COLUMNS} FROM commissions WHERE project_id = ?1"
    ))
    .bind(project_id.to_string())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| db::read_error("failed to fetch commission", e))?;

    row_to_commission(&row)
}

fn row_to_project(row: &SqliteRow) -> AppResult<ProjectRecord> {
    Ok(ProjectRecord {
        project_id: db::uuid(row, "project_id")?,
        client_id: db::uuid(row, "client_id")?,
        name: db::string(row, "name")?,
        description: db::opt_string(row, "description")?,
        status: db::text_enum(row, "status", ProjectStatus::parse)?,
        deadline: db::opt_date(row, "deadline")?,
        created_at: db::timestamp(row, "created_at")?,
    })
}

fn row_to_member(row: &SqliteRow) -> AppResult<TeamMemberRecord> {
    Ok(TeamMemberRecord {
        member_id: db::uuid(row, "member_id")?,
        project_id: db::uuid(row, "project_id")?,
        user_id: db::opt_uuid(row, "user_id")?,
        split_id: db::opt_uuid(row, "split_id")?,
        role: db::opt_string(row, "role")?,
        contribution_type: db::text_enum(row, "contribution_type", ContributionType::parse)?,
        contribution: db::decimal(row, "contribution")?,
    })
}

fn row_to_commission(row: &SqliteRow) -> AppResult<CommissionRecord> {
    Ok(CommissionRecord {
        commission_id: db::uuid(row, "commission_id")?,
        project_id: db::uuid(row, "project_id")?,
        agent_name: db::string(row, "agent_name")?,
        rate: db::decimal(row, "rate")?,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use sb_common::api::CreateClientRequest;
    use sb_common::error::AppError;
    use sb_common::types::{ContributionType, ProjectStatus};

    use super::{NewProject, NewTeamMember, ProjectStore};
    use crate::db::connect_in_memory;
    use crate::stores::client::ClientStore;

    async fn seeded() -> (ProjectStore, ClientStore, uuid::Uuid) {
        let pool = connect_in_memory().await.expect("pool");
        let clients = ClientStore::new(pool.clone());
        let client = clients
            .create(&CreateClientRequest {
                name: "Acme".to_string(),
                email: "ops@acme.test".to_string(),
                phone: None,
                company: None,
                address: None,
            })
            .await
            .expect("client");
        (ProjectStore::new(pool), clients, client.client_id)
    }

    fn new_project(client_id: uuid::Uuid, name: &str, status: ProjectStatus) -> NewProject {
        NewProject {
            client_id,
            name: name.to_string(),
            description: None,
            status,
            deadline: None,
        }
    }

    #[tokio::test]
    async fn filters_by_client_and_status() {
        let (projects, _, client_id) = seeded().await;
        projects
            .create(&new_project(client_id, "Site", ProjectStatus::Active))
            .await
            .expect("create");
        projects
            .create(&new_project(client_id, "Logo", ProjectStatus::Completed))
            .await
            .expect("create");

        assert_eq!(projects.list(Some(client_id), None).await.expect("list").len(), 2);
        let done = projects
            .list(None, Some(ProjectStatus::Completed))
            .await
            .expect("list");
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].name, "Logo");
        assert!(projects
            .list(Some(uuid::Uuid::new_v4()), None)
            .await
            .expect("list")
            .is_empty());
    }

    #[tokio::test]
    async fn client_with_projects_cannot_be_deleted() {
        let (projects, clients, client_id) = seeded().await;
        let project = projects
            .create(&new_project(client_id, "Site", ProjectStatus::Active))
            .await
            .expect("create");

        let err = clients.delete(client_id).await.expect_err("blocked");
        assert!(matches!(err, AppError::Conflict(_)));

        projects.delete(project.project_id).await.expect("delete project");
        clients.delete(client_id).await.expect("delete client");
    }

    #[tokio::test]
    async fn team_members_and_commission_cascade_with_project() {
        let (projects, _, client_id) = seeded().await;
        let project = projects
            .create(&new_project(client_id, "Site", ProjectStatus::Active))
            .await
            .expect("create");

        let member = projects
            .add_team_member(
                project.project_id,
                &NewTeamMember {
                    user_id: None,
                    role: Some("dev".to_string()),
                    contribution_type: ContributionType::Percentage,
                    contribution: dec!(40),
                },
            )
            .await
            .expect("member");
        assert_eq!(member.split_id, None);

        let commission = projects
            .create_commission(project.project_id, "Dana", dec!(10))
            .await
            .expect("commission");
        let err = projects
            .create_commission(project.project_id, "Eve", dec!(5))
            .await
            .expect_err("one per project");
        assert!(matches!(err, AppError::Conflict(_)));

        projects.delete(project.project_id).await.expect("delete");
        assert!(projects
            .get_team_member(member.member_id)
            .await
            .expect("get")
            .is_none());
        assert!(projects
            .get_commission_by_id(commission.commission_id)
            .await
            .expect("get")
            .is_none());
    }
}
