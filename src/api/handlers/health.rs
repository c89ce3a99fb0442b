use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::{admission::Gateway, GIT_COMMIT_HASH};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    storage: String,
    backend: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Storage is reachable", body = Health),
        (status = 503, description = "Storage is unreachable", body = Health)
    ),
    tag = "health"
)]
// axum handler for health
pub async fn health(method: Method, gateway: Extension<Arc<Gateway>>) -> impl IntoResponse {
    let store = gateway.store();
    let result = store.ping().await.map_err(|err| {
        error!("Failed to ping {} store: {err}", store.backend());
    });

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: if result.is_ok() {
            "ok".to_string()
        } else {
            "error".to_string()
        },
        backend: store.backend().to_string(),
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);

            let mut headers = HeaderMap::new();
            headers.insert("X-App", x_app_header_value);
            headers
        })
        .map_err(|err| {
            error!("Failed to parse X-App header: {}", err);
        })
        .unwrap_or_default();

    if result.is_ok() {
        debug!("Storage is healthy");
        (StatusCode::OK, headers, body)
    } else {
        debug!("Storage is unhealthy");
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}
