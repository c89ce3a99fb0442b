//! Admission state machine and passkey gate.
//!
//! Flow Overview:
//! 1) A collaborator (HTTP handler or console worker) calls one [`Gateway`] operation.
//! 2) The operation takes the [`AccessGuard`] and checks the transition against the registry.
//! 3) The change is written to the durable [`Store`](crate::storage::Store) while the guard is held.
//! 4) Only after the write succeeds is the in-memory view updated, so a failed call leaves no trace.
//!
//! The durable store is authoritative; the registry and credential kept behind the guard are a
//! cache loaded once at start-up.

mod credential;
mod error;
mod gateway;
mod guard;
mod registry;
mod username;

pub use credential::{Credential, DEFAULT_PASSKEY};
pub use error::AdmissionError;
pub use gateway::Gateway;
pub use guard::{AccessGuard, GuardedState};
pub use registry::{Registry, RegistryError};
pub use username::{validate_username, USERNAME_MAX_LEN};

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

/// Reason stored when a ban is issued without one.
pub const DEFAULT_BAN_REASON: &str = "banned by administrator";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Approved,
    Denied,
    Banned,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::Banned => "banned",
        }
    }

    /// Only denied and banned records keep a reason.
    #[must_use]
    pub const fn carries_reason(self) -> bool {
        matches!(self, Self::Denied | Self::Banned)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "denied" => Ok(Self::Denied),
            "banned" => Ok(Self::Banned),
            other => Err(format!("unknown admission status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AdmissionRecord {
    pub username: String,
    pub status: Status,
    pub reason: Option<String>,
}

impl AdmissionRecord {
    #[must_use]
    pub fn pending(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            status: Status::Pending,
            reason: None,
        }
    }

    /// Builds a record, dropping `reason` when `status` does not carry one.
    #[must_use]
    pub fn new(username: impl Into<String>, status: Status, reason: Option<String>) -> Self {
        Self {
            username: username.into(),
            status,
            reason: reason.filter(|_| status.carries_reason()),
        }
    }
}

/// A status change requested by a moderator.
///
/// Each variant is legal from exactly one source status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Approve,
    Deny { reason: String },
    Ban { reason: Option<String> },
    Unban,
}

impl Transition {
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Deny { .. } => "deny",
            Self::Ban { .. } => "ban",
            Self::Unban => "unban",
        }
    }

    #[must_use]
    pub const fn source(&self) -> Status {
        match self {
            Self::Approve | Self::Deny { .. } => Status::Pending,
            Self::Ban { .. } => Status::Approved,
            Self::Unban => Status::Banned,
        }
    }

    #[must_use]
    pub const fn target(&self) -> Status {
        match self {
            Self::Approve | Self::Unban => Status::Approved,
            Self::Deny { .. } => Status::Denied,
            Self::Ban { .. } => Status::Banned,
        }
    }

    /// Applies the transition to `record`, returning the resulting record.
    ///
    /// # Errors
    /// Returns `AdmissionError::IllegalTransition` if `record` is not in the source status.
    pub fn apply(&self, record: &AdmissionRecord) -> Result<AdmissionRecord, AdmissionError> {
        if record.status != self.source() {
            return Err(AdmissionError::IllegalTransition {
                username: record.username.clone(),
                from: record.status,
                operation: self.operation(),
            });
        }

        let reason = match self {
            Self::Approve | Self::Unban => None,
            Self::Deny { reason } => Some(reason.clone()),
            Self::Ban { reason } => Some(
                reason
                    .clone()
                    .unwrap_or_else(|| DEFAULT_BAN_REASON.to_string()),
            ),
        };

        Ok(AdmissionRecord::new(
            record.username.clone(),
            self.target(),
            reason,
        ))
    }
}
