use sb_common::error::{AppError, AppResult};
use sb_common::types::{UserRecord, UserRole};
use sqlx::sqlite::SqliteRow;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;

const USER_COLUMNS: &str = "user_id, name, email, role, created_at";

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, name: &str, email: &str, role: UserRole) -> AppResult<UserRecord> {
        let user_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO users (user_id, name, email, role, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(user_id.to_string())
        .bind(name)
        .bind(email)
        .bind(role.as_str())
        .bind(db::now_timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| db::write_error("failed to create user", e))?;

        self.get(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user"))
    }

    pub async fn get(&self, user_id: Uuid) -> AppResult<Option<UserRecord>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"))
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db::read_error("failed to fetch user", e))?;

        row.as_ref().map(row_to_user).transpose()
    }

    pub async fn list(&self) -> AppResult<Vec<UserRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY name COLLATE NOCASE, created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db::read_error("failed to list users", e))?;

        rows.iter().map(row_to_user).collect()
    }
}

fn row_to_user(row: &SqliteRow) -> AppResult<UserRecord> {
    Ok(UserRecord {
        user_id: db::uuid(row, "user_id")?,
        name: db::string(row, "name")?,
        email: db::string(row, "email")?,
        role: db::text_enum(row, "role", UserRole::parse)?,
        created_at: db::timestamp(row, "created_at")?,
    })
}
