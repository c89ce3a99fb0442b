//! Admission moderation endpoints.
//!
//! Flow Overview:
//! 1) Clients register a username (`POST /v1/admissions`) and poll its status.
//! 2) Moderators approve, deny, ban, unban, rename or remove it.
//! 3) Every call goes through the shared gateway, the same one the console uses.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::{missing_payload, ErrorBody};
use crate::admission::{AdmissionError, AdmissionRecord, Gateway};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct DenyRequest {
    pub reason: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct BanRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RenameRequest {
    pub new_username: String,
}

#[utoipa::path(
    post,
    path = "/v1/admissions",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Username registered as pending.", body = AdmissionRecord),
        (status = 400, description = "Malformed username.", body = ErrorBody),
        (status = 409, description = "Username already registered.", body = ErrorBody),
        (status = 503, description = "Storage unavailable.", body = ErrorBody),
    ),
    tag = "admissions"
)]
pub async fn register(
    gateway: Extension<Arc<Gateway>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return missing_payload();
    };

    match gateway.register(&request.username).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/admissions",
    responses(
        (status = 200, description = "All admission records, sorted by username.", body = [AdmissionRecord]),
    ),
    tag = "admissions"
)]
pub async fn list(gateway: Extension<Arc<Gateway>>) -> impl IntoResponse {
    Json(gateway.list().await)
}

#[utoipa::path(
    get,
    path = "/v1/admissions/{username}",
    params(
        ("username" = String, Path, description = "Username")
    ),
    responses(
        (status = 200, description = "Current admission record.", body = AdmissionRecord),
        (status = 404, description = "Unknown username.", body = ErrorBody),
    ),
    tag = "admissions"
)]
pub async fn status(
    Path(username): Path<String>,
    gateway: Extension<Arc<Gateway>>,
) -> impl IntoResponse {
    respond(gateway.status(&username).await)
}

#[utoipa::path(
    post,
    path = "/v1/admissions/{username}/approve",
    params(
        ("username" = String, Path, description = "Username")
    ),
    responses(
        (status = 200, description = "Record approved.", body = AdmissionRecord),
        (status = 404, description = "Unknown username.", body = ErrorBody),
        (status = 409, description = "Record is not pending.", body = ErrorBody),
        (status = 503, description = "Storage unavailable.", body = ErrorBody),
    ),
    tag = "admissions"
)]
pub async fn approve(
    Path(username): Path<String>,
    gateway: Extension<Arc<Gateway>>,
) -> impl IntoResponse {
    respond(gateway.approve(&username).await)
}

#[utoipa::path(
    post,
    path = "/v1/admissions/{username}/deny",
    params(
        ("username" = String, Path, description = "Username")
    ),
    request_body = DenyRequest,
    responses(
        (status = 200, description = "Record denied.", body = AdmissionRecord),
        (status = 400, description = "Missing reason.", body = ErrorBody),
        (status = 404, description = "Unknown username.", body = ErrorBody),
        (status = 409, description = "Record is not pending.", body = ErrorBody),
        (status = 503, description = "Storage unavailable.", body = ErrorBody),
    ),
    tag = "admissions"
)]
pub async fn deny(
    Path(username): Path<String>,
    gateway: Extension<Arc<Gateway>>,
    payload: Option<Json<DenyRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return missing_payload();
    };

    respond(gateway.deny(&username, &request.reason).await)
}

#[utoipa::path(
    post,
    path = "/v1/admissions/{username}/ban",
    params(
        ("username" = String, Path, description = "Username")
    ),
    request_body(content = BanRequest, description = "Optional ban reason."),
    responses(
        (status = 200, description = "Record banned.", body = AdmissionRecord),
        (status = 404, description = "Unknown username.", body = ErrorBody),
        (status = 409, description = "Record is not approved.", body = ErrorBody),
        (status = 503, description = "Storage unavailable.", body = ErrorBody),
    ),
    tag = "admissions"
)]
pub async fn ban(
    Path(username): Path<String>,
    gateway: Extension<Arc<Gateway>>,
    payload: Option<Json<BanRequest>>,
) -> impl IntoResponse {
    // The body is optional; no body means the default reason.
    let request = payload.map(|Json(request)| request).unwrap_or_default();

    respond(gateway.ban(&username, request.reason.as_deref()).await)
}

#[utoipa::path(
    post,
    path = "/v1/admissions/{username}/unban",
    params(
        ("username" = String, Path, description = "Username")
    ),
    responses(
        (status = 200, description = "Record unbanned.", body = AdmissionRecord),
        (status = 404, description = "Unknown username.", body = ErrorBody),
        (status = 409, description = "Record is not banned.", body = ErrorBody),
        (status = 503, description = "Storage unavailable.", body = ErrorBody),
    ),
    tag = "admissions"
)]
pub async fn unban(
    Path(username): Path<String>,
    gateway: Extension<Arc<Gateway>>,
) -> impl IntoResponse {
    respond(gateway.unban(&username).await)
}

#[utoipa::path(
    post,
    path = "/v1/admissions/{username}/rename",
    params(
        ("username" = String, Path, description = "Current username")
    ),
    request_body = RenameRequest,
    responses(
        (status = 200, description = "Record moved to the new username.", body = AdmissionRecord),
        (status = 400, description = "Malformed new username.", body = ErrorBody),
        (status = 404, description = "Unknown username.", body = ErrorBody),
        (status = 409, description = "New username already taken.", body = ErrorBody),
        (status = 503, description = "Storage unavailable.", body = ErrorBody),
    ),
    tag = "admissions"
)]
pub async fn rename(
    Path(username): Path<String>,
    gateway: Extension<Arc<Gateway>>,
    payload: Option<Json<RenameRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return missing_payload();
    };

    respond(gateway.rename(&username, &request.new_username).await)
}

#[utoipa::path(
    delete,
    path = "/v1/admissions/{username}",
    params(
        ("username" = String, Path, description = "Username")
    ),
    responses(
        (status = 204, description = "Record deleted."),
        (status = 404, description = "Unknown username.", body = ErrorBody),
        (status = 503, description = "Storage unavailable.", body = ErrorBody),
    ),
    tag = "admissions"
)]
pub async fn remove(
    Path(username): Path<String>,
    gateway: Extension<Arc<Gateway>>,
) -> impl IntoResponse {
    match gateway.remove(&username).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

fn respond(result: Result<AdmissionRecord, AdmissionError>) -> Response {
    match result {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => err.into_response(),
    }
}
