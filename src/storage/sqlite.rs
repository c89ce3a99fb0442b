use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Connection, Row, SqlitePool,
};
use std::{str::FromStr, time::Duration};
use tracing::{debug, info_span, Instrument};

use super::{StorageError, Store};
use crate::admission::{AdmissionRecord, Status};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

fn db_span(operation: &'static str) -> tracing::Span {
    info_span!("db.query", db.system = "sqlite", db.operation = operation)
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `dsn` and applies the schema.
    ///
    /// # Errors
    /// Returns an error if the DSN is invalid, the database cannot be opened, or the schema fails.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(dsn)
            .with_context(|| format!("Invalid SQLite DSN: {dsn}"))?
            .create_if_missing(true);

        // Every connection to an in-memory database sees its own empty database, so keep exactly
        // one connection alive for the lifetime of the pool.
        let pool_options = if is_in_memory(dsn) {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .max_lifetime(Duration::from_secs(60 * 2))
                .test_before_acquire(true)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store
            .apply_schema()
            .await
            .context("Failed to apply database schema")?;

        Ok(store)
    }

    async fn apply_schema(&self) -> Result<(), StorageError> {
        for statement in split_sql_statements(SCHEMA_SQL) {
            sqlx::query(&statement)
                .execute(&self.pool)
                .instrument(db_span("CREATE"))
                .await?;
        }
        debug!("Database schema applied");
        Ok(())
    }
}

fn is_in_memory(dsn: &str) -> bool {
    dsn.contains(":memory:") || dsn.contains("mode=memory")
}

/// Splits the schema into statements ending in `;`, dropping `--` comment lines.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

fn record_from_row(row: &SqliteRow) -> Result<AdmissionRecord, StorageError> {
    let username: String = row.try_get("username")?;
    let status: String = row.try_get("status")?;
    let reason: Option<String> = row.try_get("reason")?;
    let status = Status::from_str(&status).map_err(StorageError::Corrupt)?;

    Ok(AdmissionRecord::new(username, status, reason))
}

#[async_trait]
impl Store for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn ping(&self) -> Result<(), StorageError> {
        let mut conn = self
            .pool
            .acquire()
            .instrument(info_span!(
                "db.acquire",
                db.system = "sqlite",
                db.operation = "ACQUIRE"
            ))
            .await?;
        conn.ping()
            .instrument(info_span!("db.ping", db.system = "sqlite", db.operation = "PING"))
            .await?;
        Ok(())
    }

    async fn load_passkey(&self) -> Result<Option<SecretString>, StorageError> {
        let row = sqlx::query("SELECT key FROM passkey WHERE id = 1")
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT"))
            .await?;

        row.map(|row| row.try_get::<String, _>("key").map(SecretString::from))
            .transpose()
            .map_err(StorageError::from)
    }

    async fn save_passkey(&self, passkey: &SecretString) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO passkey (id, key) VALUES (1, ?1)
            ON CONFLICT (id) DO UPDATE SET key = excluded.key
            ",
        )
        .bind(passkey.expose_secret())
        .execute(&self.pool)
        .instrument(db_span("UPSERT"))
        .await?;
        Ok(())
    }

    async fn load_records(&self) -> Result<Vec<AdmissionRecord>, StorageError> {
        let rows = sqlx::query("SELECT username, status, reason FROM users ORDER BY username")
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT"))
            .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn insert_record(&self, record: &AdmissionRecord) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO users (username, status, reason) VALUES (?1, ?2, ?3)")
            .bind(&record.username)
            .bind(record.status.as_str())
            .bind(record.reason.as_deref())
            .execute(&self.pool)
            .instrument(db_span("INSERT"))
            .await?;
        Ok(())
    }

    async fn update_record(&self, record: &AdmissionRecord) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE users SET status = ?1, reason = ?2 WHERE username = ?3")
            .bind(record.status.as_str())
            .bind(record.reason.as_deref())
            .bind(&record.username)
            .execute(&self.pool)
            .instrument(db_span("UPDATE"))
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::MissingRow(record.username.clone()));
        }
        Ok(())
    }

    async fn rename_record(&self, old: &str, new: &str) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE users SET username = ?1 WHERE username = ?2")
            .bind(new)
            .bind(old)
            .execute(&self.pool)
            .instrument(db_span("UPDATE"))
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::MissingRow(old.to_string()));
        }
        Ok(())
    }

    async fn delete_record(&self, username: &str) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM users WHERE username = ?1")
            .bind(username)
            .execute(&self.pool)
            .instrument(db_span("DELETE"))
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::MissingRow(username.to_string()));
        }
        Ok(())
    }
}
