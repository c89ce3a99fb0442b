//! Durable storage for the passkey and admission records.
//!
//! The store is the authoritative copy. The gateway writes here first and only then updates
//! its in-memory view, holding the access guard across both steps.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use secrecy::SecretString;
use std::{fmt, sync::Arc};
use thiserror::Error;
use tracing::warn;

use crate::admission::AdmissionRecord;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored row missing for {0}")]
    MissingRow(String),
    #[error("stored data is invalid: {0}")]
    Corrupt(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Store: Send + Sync + fmt::Debug {
    /// Short backend name reported by `/health`.
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> Result<(), StorageError>;

    async fn load_passkey(&self) -> Result<Option<SecretString>, StorageError>;

    async fn save_passkey(&self, passkey: &SecretString) -> Result<(), StorageError>;

    async fn load_records(&self) -> Result<Vec<AdmissionRecord>, StorageError>;

    async fn insert_record(&self, record: &AdmissionRecord) -> Result<(), StorageError>;

    /// Overwrites status and reason of an existing row.
    async fn update_record(&self, record: &AdmissionRecord) -> Result<(), StorageError>;

    async fn rename_record(&self, old: &str, new: &str) -> Result<(), StorageError>;

    async fn delete_record(&self, username: &str) -> Result<(), StorageError>;
}

/// Opens the store named by `dsn`, falling back to a volatile in-memory store.
///
/// # Errors
/// Returns an error if the database cannot be opened or the schema cannot be applied.
pub async fn connect(dsn: Option<&str>) -> anyhow::Result<Arc<dyn Store>> {
    match dsn {
        Some(dsn) => Ok(Arc::new(SqliteStore::connect(dsn).await?)),
        None => {
            warn!("No DSN configured, admission state will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
