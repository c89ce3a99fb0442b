use utoipa::OpenApi;

use super::handlers::{admissions, health, passkey, ErrorBody};
use crate::admission::{AdmissionRecord, Status};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        admissions::register,
        admissions::list,
        admissions::status,
        admissions::approve,
        admissions::deny,
        admissions::ban,
        admissions::unban,
        admissions::rename,
        admissions::remove,
        passkey::verify,
        passkey::rotate,
        passkey::current,
    ),
    components(schemas(
        AdmissionRecord,
        Status,
        ErrorBody,
        admissions::RegisterRequest,
        admissions::DenyRequest,
        admissions::BanRequest,
        admissions::RenameRequest,
        passkey::PasskeyRequest,
        passkey::VerifyResponse,
        passkey::PasskeyResponse,
        health::Health,
    )),
    tags(
        (name = "admissions", description = "Username admission and moderation"),
        (name = "passkey", description = "Shared passkey gate"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
