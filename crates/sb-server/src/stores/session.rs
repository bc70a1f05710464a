use chrono::{DateTime, Utc};
use sb_common::error::{AppError, AppResult};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub token_hash: String,
    pub token_prefix: String,
    pub expires_at: DateTime<Utc>,
    pub auth_method: String,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_password_session(
        &self,
        token_hash: &str,
        token_prefix: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<SessionRecord> {
        let session_id = Uuid::new_v4();
        let expires_at = db::timestamp_text(expires_at);

        sqlx::query(
            "INSERT INTO admin_sessions (session_id, token_hash, token_prefix, expires_at, auth_method, created_at) \
             VALUES (?1, ?2, ?3, ?4, 'password', ?5)",
        )
        .bind(session_id.to_string())
        .bind(token_hash)
        .bind(token_prefix)
        .bind(&expires_at)
        .bind(db::now_timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| db::write_error("failed to create session", e))?;

        self.lookup_by_prefix(token_prefix)
            .await?
            .ok_or_else(|| AppError::not_found("session"))
    }

    pub async fn lookup_by_prefix(&self, prefix: &str) -> AppResult<Option<SessionRecord>> {
        let row = sqlx::query(
            "SELECT session_id, token_hash, token_prefix, expires_at, auth_method \
             FROM admin_sessions WHERE token_prefix = ?1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(prefix)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db::read_error("failed to lookup session", e))?;

        row.map(|row| {
            Ok(SessionRecord {
                session_id: db::uuid(&row, "session_id")?,
                token_hash: db::string(&row, "token_hash")?,
                token_prefix: db::string(&row, "token_prefix")?,
                expires_at: db::timestamp(&row, "expires_at")?,
                auth_method: db::string(&row, "auth_method")?,
            })
        })
        .transpose()
    }

    pub async fn delete_by_prefix(&self, prefix: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM admin_sessions WHERE token_prefix = ?1")
            .bind(prefix)
            .execute(&self.pool)
            .await
            .map_err(|e| db::write_error("failed to delete session", e))?;
        Ok(())
    }

    pub async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM admin_sessions WHERE expires_at <= ?1")
            .bind(db::timestamp_text(now))
            .execute(&self.pool)
            .await
            .map_err(|e| db::write_error("failed to purge sessions", e))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::SessionStore;
    use crate::db::connect_in_memory;

    #[tokio::test]
    async fn create_lookup_delete_session() {
        let pool = connect_in_memory().await.expect("pool");

        let store = SessionStore::new(pool);
        let created = store
            .create_password_session("hash", "sbs_abcdef12", Utc::now() + Duration::hours(1))
            .await
            .expect("create");
        assert_eq!(created.token_prefix, "sbs_abcdef12");
        assert!(!created.is_expired(Utc::now()));

        let found = store
            .lookup_by_prefix("sbs_abcdef12")
            .await
            .expect("lookup")
            .expect("exists");
        assert_eq!(found.auth_method, "password");

        store.delete_by_prefix("sbs_abcdef12").await.expect("delete");
        let missing = store.lookup_by_prefix("sbs_abcdef12").await.expect("lookup");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn purges_only_expired_sessions() {
        let pool = connect_in_memory().await.expect("pool");
        let store = SessionStore::new(pool);
        store
            .create_password_session("hash", "sbs_live0000", Utc::now() + Duration::hours(24))
            .await
            .expect("create");

        assert_eq!(store.delete_expired(Utc::now()).await.expect("purge"), 0);
        let later = Utc::now() + Duration::hours(25);
        assert_eq!(store.delete_expired(later).await.expect("purge"), 1);
    }
}
