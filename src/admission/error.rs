use thiserror::Error;

use super::{RegistryError, Status};
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("username already exists: {0}")]
    AlreadyExists(String),
    #[error("username not found: {0}")]
    NotFound(String),
    #[error("cannot {operation} {username}: record is {from}")]
    IllegalTransition {
        username: String,
        from: Status,
        operation: &'static str,
    },
    #[error("passkey mismatch")]
    CredentialMismatch,
    #[error("storage failure: {0}")]
    StorageFailure(#[from] StorageError),
}

impl AdmissionError {
    /// Stable machine-readable kind, used in API error bodies and console replies.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::AlreadyExists(_) => "already_exists",
            Self::NotFound(_) => "not_found",
            Self::IllegalTransition { .. } => "illegal_transition",
            Self::CredentialMismatch => "credential_mismatch",
            Self::StorageFailure(_) => "storage_failure",
        }
    }

    /// Only storage failures are worth retrying; everything else is deterministic.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageFailure(_))
    }
}

impl From<RegistryError> for AdmissionError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(username) => Self::NotFound(username),
            RegistryError::AlreadyExists(username) => Self::AlreadyExists(username),
        }
    }
}
