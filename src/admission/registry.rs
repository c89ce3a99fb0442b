//! In-memory view of admission records.
//!
//! The registry enforces data-model invariants only (key uniqueness, reason only on
//! denied/banned records). Business rules live in the gateway.

use std::collections::HashMap;
use thiserror::Error;

use super::{AdmissionRecord, Status};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("username not found: {0}")]
    NotFound(String),
    #[error("username already exists: {0}")]
    AlreadyExists(String),
}

#[derive(Debug, Default)]
pub struct Registry {
    records: HashMap<String, AdmissionRecord>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the registry from stored records. Later duplicates overwrite earlier ones.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = AdmissionRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.username.clone(), record))
                .collect(),
        }
    }

    /// Creates a pending record.
    ///
    /// # Errors
    /// Returns `RegistryError::AlreadyExists` if the username is taken in any status.
    pub fn create(&mut self, username: &str) -> Result<&AdmissionRecord, RegistryError> {
        if self.records.contains_key(username) {
            return Err(RegistryError::AlreadyExists(username.to_string()));
        }

        Ok(self
            .records
            .entry(username.to_string())
            .or_insert_with(|| AdmissionRecord::pending(username)))
    }

    #[must_use]
    pub fn get(&self, username: &str) -> Option<&AdmissionRecord> {
        self.records.get(username)
    }

    #[must_use]
    pub fn contains(&self, username: &str) -> bool {
        self.records.contains_key(username)
    }

    /// Overwrites status and reason. The reason is dropped for pending/approved.
    ///
    /// # Errors
    /// Returns `RegistryError::NotFound` if there is no record for `username`.
    pub fn set_status(
        &mut self,
        username: &str,
        status: Status,
        reason: Option<String>,
    ) -> Result<&AdmissionRecord, RegistryError> {
        let record = self
            .records
            .get_mut(username)
            .ok_or_else(|| RegistryError::NotFound(username.to_string()))?;

        *record = AdmissionRecord::new(username, status, reason);

        Ok(record)
    }

    /// Moves a record to a new key, keeping status and reason.
    ///
    /// # Errors
    /// Returns `RegistryError::NotFound` if `old` is absent, or `RegistryError::AlreadyExists`
    /// if `new` is taken. Neither record is touched on error.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<&AdmissionRecord, RegistryError> {
        if !self.records.contains_key(old) {
            return Err(RegistryError::NotFound(old.to_string()));
        }
        if self.records.contains_key(new) {
            return Err(RegistryError::AlreadyExists(new.to_string()));
        }

        let mut record = self
            .records
            .remove(old)
            .ok_or_else(|| RegistryError::NotFound(old.to_string()))?;
        record.username = new.to_string();

        Ok(self.records.entry(new.to_string()).or_insert(record))
    }

    /// Hard-deletes a record.
    ///
    /// # Errors
    /// Returns `RegistryError::NotFound` if there is no record for `username`.
    pub fn remove(&mut self, username: &str) -> Result<AdmissionRecord, RegistryError> {
        self.records
            .remove(username)
            .ok_or_else(|| RegistryError::NotFound(username.to_string()))
    }

    /// All records ordered by username.
    #[must_use]
    pub fn list(&self) -> Vec<AdmissionRecord> {
        let mut records: Vec<AdmissionRecord> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.username.cmp(&b.username));
        records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
