//! API handlers for Turnstile.
//!
//! Handlers translate requests into [`Gateway`](crate::admission::Gateway) calls and map
//! [`AdmissionError`] into stable HTTP responses.

pub mod admissions;
pub mod health;
pub mod passkey;
pub mod root;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::admission::AdmissionError;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error kind, e.g. `not_found` or `illegal_transition`.
    pub error: String,
    pub message: String,
}

impl AdmissionError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::AlreadyExists(_) | Self::IllegalTransition { .. } => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::CredentialMismatch => StatusCode::UNAUTHORIZED,
            Self::StorageFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AdmissionError {
    /// Storage details are logged by the gateway and never returned to the client.
    fn into_response(self) -> Response {
        let message = match &self {
            Self::StorageFailure(err) => {
                error!("Responding with storage failure: {err}");
                "Storage is unavailable, retry later.".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: self.kind().to_string(),
            message,
        };

        (self.status_code(), Json(body)).into_response()
    }
}

/// Shorthand for handlers that reject a missing or malformed JSON body.
pub(crate) fn missing_payload() -> Response {
    AdmissionError::InvalidInput("missing or malformed JSON payload".to_string()).into_response()
}
