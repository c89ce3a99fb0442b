use async_trait::async_trait;
use secrecy::SecretString;
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use super::{StorageError, Store};
use crate::admission::AdmissionRecord;

#[derive(Debug, Default)]
struct Tables {
    passkey: Option<SecretString>,
    users: HashMap<String, AdmissionRecord>,
}

/// Process-local store used when no DSN is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.tables
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.tables().map(|_| ())
    }

    async fn load_passkey(&self) -> Result<Option<SecretString>, StorageError> {
        Ok(self.tables()?.passkey.clone())
    }

    async fn save_passkey(&self, passkey: &SecretString) -> Result<(), StorageError> {
        self.tables()?.passkey = Some(passkey.clone());
        Ok(())
    }

    async fn load_records(&self) -> Result<Vec<AdmissionRecord>, StorageError> {
        Ok(self.tables()?.users.values().cloned().collect())
    }

    async fn insert_record(&self, record: &AdmissionRecord) -> Result<(), StorageError> {
        let mut tables = self.tables()?;
        if tables.users.contains_key(&record.username) {
            return Err(StorageError::Corrupt(format!(
                "row already present for {}",
                record.username
            )));
        }
        tables
            .users
            .insert(record.username.clone(), record.clone());
        Ok(())
    }

    async fn update_record(&self, record: &AdmissionRecord) -> Result<(), StorageError> {
        let mut tables = self.tables()?;
        let row = tables
            .users
            .get_mut(&record.username)
            .ok_or_else(|| StorageError::MissingRow(record.username.clone()))?;
        *row = record.clone();
        Ok(())
    }

    async fn rename_record(&self, old: &str, new: &str) -> Result<(), StorageError> {
        let mut tables = self.tables()?;
        if tables.users.contains_key(new) {
            return Err(StorageError::Corrupt(format!("row already present for {new}")));
        }
        let mut row = tables
            .users
            .remove(old)
            .ok_or_else(|| StorageError::MissingRow(old.to_string()))?;
        row.username = new.to_string();
        tables.users.insert(new.to_string(), row);
        Ok(())
    }

    async fn delete_record(&self, username: &str) -> Result<(), StorageError> {
        self.tables()?
            .users
            .remove(username)
            .map(|_| ())
            .ok_or_else(|| StorageError::MissingRow(username.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::Status;
    use secrecy::ExposeSecret;

    #[tokio::test]
    async fn passkey_starts_empty() {
        let store = MemoryStore::new();
        assert!(store.load_passkey().await.expect("load").is_none());

        store
            .save_passkey(&SecretString::from("abc"))
            .await
            .expect("save");
        let passkey = store.load_passkey().await.expect("load").expect("passkey");
        assert_eq!(passkey.expose_secret(), "abc");
    }

    #[tokio::test]
    async fn rename_and_delete_report_missing_rows() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.rename_record("ghost", "bob").await,
            Err(StorageError::MissingRow(_))
        ));
        assert!(matches!(
            store.delete_record("ghost").await,
            Err(StorageError::MissingRow(_))
        ));
    }

    #[tokio::test]
    async fn update_overwrites_row() {
        let store = MemoryStore::new();
        store
            .insert_record(&AdmissionRecord::pending("alice"))
            .await
            .expect("insert");
        store
            .update_record(&AdmissionRecord::new(
                "alice",
                Status::Denied,
                Some("spam".to_string()),
            ))
            .await
            .expect("update");

        let records = store.load_records().await.expect("load");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, Status::Denied);
        assert_eq!(records[0].reason.as_deref(), Some("spam"));
    }
}
