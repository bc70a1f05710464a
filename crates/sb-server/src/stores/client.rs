use sb_common::api::{CreateClientRequest, UpdateClientRequest};
use sb_common::error::{AppError, AppResult};
use sb_common::types::ClientRecord;
use sqlx::sqlite::SqliteRow;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;

const CLIENT_COLUMNS: &str = "client_id, name, email, phone, company, address, created_at";

#[derive(Clone)]
pub struct ClientStore {
    pool: SqlitePool,
}

impl ClientStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, req: &CreateClientRequest) -> AppResult<ClientRecord> {
        let client_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO clients (client_id, name, email, phone, company, address, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(client_id.to_string())
        .bind(req.name.trim())
        .bind(req.email.trim())
        .bind(req.phone.as_deref())
        .bind(req.company.as_deref())
        .bind(req.address.as_deref())
        .bind(db::now_timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| db::write_error("failed to create client", e))?;

        self.require(client_id).await
    }

    pub async fn get(&self, client_id: Uuid) -> AppResult<Option<ClientRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE client_id = ?1"
        ))
        .bind(client_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db::read_error("failed to fetch client", e))?;

        row.as_ref().map(row_to_client).transpose()
    }

    pub async fn require(&self, client_id: Uuid) -> AppResult<ClientRecord> {
        self.get(client_id)
            .await?
            .ok_or_else(|| AppError::not_found("client"))
    }

    /// Newest first. `search` matches name, email or company, ignoring case.
    pub async fn list(&self, search: Option<&str>) -> AppResult<Vec<ClientRecord>> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));

        let rows = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients \
             WHERE ?1 IS NULL \
                OR lower(name) LIKE ?1 \
                OR lower(email) LIKE ?1 \
                OR lower(COALESCE(company, '')) LIKE ?1 \
             ORDER BY created_at DESC"
        ))
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db::read_error("failed to list clients", e))?;

        rows.iter().map(row_to_client).collect()
    }

    pub async fn update(
        &self,
        client_id: Uuid,
        req: &UpdateClientRequest,
    ) -> AppResult<ClientRecord> {
        let current = self.require(client_id).await?;

        sqlx::query(
            "UPDATE clients SET name = ?2, email = ?3, phone = ?4, company = ?5, address = ?6 \
             WHERE client_id = ?1",
        )
        .bind(client_id.to_string())
        .bind(req.name.as_deref().map(str::trim).unwrap_or(&current.name))
        .bind(req.email.as_deref().map(str::trim).unwrap_or(&current.email))
        .bind(req.phone.as_deref().or(current.phone.as_deref()))
        .bind(req.company.as_deref().or(current.company.as_deref()))
        .bind(req.address.as_deref().or(current.address.as_deref()))
        .execute(&self.pool)
        .await
        .map_err(|e| db::write_error("failed to update client", e))?;

        self.require(client_id).await
    }

    /// Fails with `Conflict` while the client still has projects.
    pub async fn delete(&self, client_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM clients WHERE client_id = ?1")
            .bind(client_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| db::write_error("failed to delete client", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("client"));
        }
        Ok(())
    }
}

fn row_to_client(row: &SqliteRow) -> AppResult<ClientRecord> {
    Ok(ClientRecord {
        client_id: db::uuid(row, "client_id")?,
        name: db::string(row, "name")?,
        email: db::string(row, "email")?,
        phone: db::opt_string(row, "phone")?,
        company: db::opt_string(row, "company")?,
        address: db::opt_string(row, "address")?,
        created_at: db::timestamp(row, "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use sb_common::api::{CreateClientRequest, UpdateClientRequest};
    use sb_common::error::AppError;

    use super::ClientStore;
    use crate::db::connect_in_memory;

    fn request(name: &str, email: &str, company: Option<&str>) -> CreateClientRequest {
        CreateClientRequest {
            name: name.to_string(),
            email: email.to_string(),
            phone: None,
            company: company.map(ToString::to_string),
            address: None,
        }
    }

    #[tokio::test]
    async fn search_matches_name_email_and_company() {
        let store = ClientStore::new(connect_in_memory().await.expect("pool"));
        store
            .create(&request("Acme", "ops@acme.test", None))
            .await
            .expect("create");
        store
            .create(&request("Jo Bloggs", "jo@mail.test", Some("Globex")))
            .await
            .expect("create");

        assert_eq!(store.list(None).await.expect("list").len(), 2);
        assert_eq!(store.list(Some("ACME")).await.expect("list").len(), 1);
        assert_eq!(store.list(Some("globex")).await.expect("list").len(), 1);
        assert_eq!(store.list(Some("mail.test")).await.expect("list").len(), 1);
        assert!(store.list(Some("initech")).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn update_keeps_unspecified_fields() {
        let store = ClientStore::new(connect_in_memory().await.expect("pool"));
        let created = store
            .create(&request("Acme", "ops@acme.test", Some("Acme Ltd")))
            .await
            .expect("create");

        let updated = store
            .update(
                created.client_id,
                &UpdateClientRequest {
                    email: Some("billing@acme.test".to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect("update");
        assert_eq!(updated.name, "Acme");
        assert_eq!(updated.email, "billing@acme.test");
        assert_eq!(updated.company.as_deref(), Some("Acme Ltd"));

        store.delete(created.client_id).await.expect("delete");
        let err = store.delete(created.client_id).await.expect_err("gone");
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
