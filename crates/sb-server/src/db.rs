use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sb_common::error::{AppError, AppResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

pub async fn connect_and_migrate(database_url: &str) -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| AppError::Config(format!("invalid SB_DATABASE_URL: {e}")))?
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| AppError::External(format!("sqlite connect failed: {e}")))?;

    migrate(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database with migrations applied.
pub async fn connect_in_memory() -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| AppError::Config(format!("invalid in-memory url: {e}")))?
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(|e| AppError::External(format!("sqlite connect failed: {e}")))?;

    migrate(&pool).await?;
    Ok(pool)
}

async fn migrate(pool: &SqlitePool) -> AppResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| AppError::External(format!("sqlite migrate failed: {e}")))
}

/// Maps a failed write. Constraint failures are the caller's fault and
/// become `Conflict`; everything else is a storage error.
pub fn write_error(context: &str, err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return AppError::Conflict(format!("{context}: already exists"));
        }
        if db.is_foreign_key_violation() {
            return AppError::Conflict(format!("{context}: still referenced by other records"));
        }
    }
    AppError::External(format!("{context}: {err}"))
}

pub fn read_error(context: &str, err: sqlx::Error) -> AppError {
    AppError::External(format!("{context}: {err}"))
}

/// Fixed-width RFC 3339 so stored timestamps sort as text.
pub fn timestamp_text(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_timestamp() -> String {
    timestamp_text(Utc::now())
}

pub fn date_text(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn string(row: &SqliteRow, column: &str) -> AppResult<String> {
    row.try_get(column)
        .map_err(|e| AppError::External(format!("read {column} failed: {e}")))
}

pub fn opt_string(row: &SqliteRow, column: &str) -> AppResult<Option<String>> {
    row.try_get(column)
        .map_err(|e| AppError::External(format!("read {column} failed: {e}")))
}

pub fn uuid(row: &SqliteRow, column: &str) -> AppResult<Uuid> {
    let raw = string(row, column)?;
    Uuid::parse_str(&raw).map_err(|e| AppError::External(format!("invalid {column} uuid: {e}")))
}

pub fn opt_uuid(row: &SqliteRow, column: &str) -> AppResult<Option<Uuid>> {
    opt_string(row, column)?
        .map(|raw| {
            Uuid::parse_str(&raw)
                .map_err(|e| AppError::External(format!("invalid {column} uuid: {e}")))
        })
        .transpose()
}

pub fn decimal(row: &SqliteRow, column: &str) -> AppResult<Decimal> {
    let raw = string(row, column)?;
    parse_decimal(column, &raw)
}

pub fn opt_decimal(row: &SqliteRow, column: &str) -> AppResult<Option<Decimal>> {
    opt_string(row, column)?
        .map(|raw| parse_decimal(column, &raw))
        .transpose()
}

fn parse_decimal(column: &str, raw: &str) -> AppResult<Decimal> {
    sb_common::money::parse_amount(raw)
        .ok_or_else(|| AppError::External(format!("invalid {column} decimal: {raw:?}")))
}

pub fn date(row: &SqliteRow, column: &str) -> AppResult<NaiveDate> {
    let raw = string(row, column)?;
    parse_date(column, &raw)
}

pub fn opt_date(row: &SqliteRow, column: &str) -> AppResult<Option<NaiveDate>> {
    opt_string(row, column)?
        .map(|raw| parse_date(column, &raw))
        .transpose()
}

fn parse_date(column: &str, raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| AppError::External(format!("invalid {column} date {raw:?}: {e}")))
}

pub fn timestamp(row: &SqliteRow, column: &str) -> AppResult<DateTime<Utc>> {
    let raw = string(row, column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::External(format!("invalid {column} timestamp {raw:?}: {e}")))
}

/// Reads a text column into one of the domain's text enums.
pub fn text_enum<T>(
    row: &SqliteRow,
    column: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> AppResult<T> {
    let raw = string(row, column)?;
    parse(&raw).ok_or_else(|| AppError::External(format!("unknown {column} value {raw:?}")))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use sqlx::Row;

    use super::{connect_in_memory, decimal, write_error};
    use sb_common::error::AppError;

    #[tokio::test]
    async fn migrations_apply_and_decimals_round_trip_as_text() {
        let pool = connect_in_memory().await.expect("pool");

        let row = sqlx::query("SELECT '1055.50' AS amount")
            .fetch_one(&pool)
            .await
            .expect("row");
        assert_eq!(decimal(&row, "amount").expect("decimal"), dec!(1055.50));

        let tables: i64 = sqlx::query(
            "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = 'split_summaries'",
        )
        .fetch_one(&pool)
        .await
        .expect("count")
        .try_get("n")
        .expect("n");
        assert_eq!(tables, 1);
    }

    #[tokio::test]
    async fn constraint_failures_become_conflicts() {
        let pool = connect_in_memory().await.expect("pool");

        let err = sqlx::query(
            "INSERT INTO projects (project_id, client_id, name, status, created_at) \
             VALUES ('p', 'missing-client', 'x', 'active', '2024-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect_err("fk violation");

        assert!(matches!(
            write_error("failed to create project", err),
            AppError::Conflict(_)
        ));
    }
}
