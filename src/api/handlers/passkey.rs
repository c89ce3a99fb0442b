//! Shared passkey endpoints: verify, rotate and (opt-in) read.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::{missing_payload, ErrorBody};
use crate::{
    admission::{AdmissionError, Gateway},
    api::ApiConfig,
};

// No Debug derive: the passkey must not end up in logs.
#[derive(Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PasskeyRequest {
    pub passkey: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyResponse {
    pub valid: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PasskeyResponse {
    pub status: String,
    pub passkey: String,
}

#[utoipa::path(
    post,
    path = "/v1/passkey/verify",
    request_body = PasskeyRequest,
    responses(
        (status = 200, description = "Passkey matches.", body = VerifyResponse),
        (status = 400, description = "Missing passkey.", body = ErrorBody),
        (status = 401, description = "Passkey does not match.", body = VerifyResponse),
    ),
    tag = "passkey"
)]
pub async fn verify(
    gateway: Extension<Arc<Gateway>>,
    payload: Option<Json<PasskeyRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return missing_payload();
    };

    match gateway.verify_passkey(&request.passkey).await {
        Ok(()) => (StatusCode::OK, Json(VerifyResponse { valid: true })).into_response(),
        Err(AdmissionError::CredentialMismatch) => (
            StatusCode::UNAUTHORIZED,
            Json(VerifyResponse { valid: false }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/v1/passkey",
    request_body = PasskeyRequest,
    responses(
        (status = 204, description = "Passkey replaced."),
        (status = 400, description = "Missing or empty passkey.", body = ErrorBody),
        (status = 503, description = "Storage unavailable.", body = ErrorBody),
    ),
    tag = "passkey"
)]
pub async fn rotate(
    gateway: Extension<Arc<Gateway>>,
    payload: Option<Json<PasskeyRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return missing_payload();
    };

    match gateway
        .rotate_passkey(SecretString::from(request.passkey))
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/passkey",
    responses(
        (status = 200, description = "Current passkey.", body = PasskeyResponse),
        (status = 404, description = "Reading the passkey is disabled."),
    ),
    tag = "passkey"
)]
pub async fn current(
    gateway: Extension<Arc<Gateway>>,
    config: Extension<ApiConfig>,
) -> impl IntoResponse {
    if !config.expose_passkey {
        return StatusCode::NOT_FOUND.into_response();
    }

    let passkey = gateway.current_passkey().await;
    Json(PasskeyResponse {
        status: "success".to_string(),
        passkey: passkey.expose_secret().to_string(),
    })
    .into_response()
}
