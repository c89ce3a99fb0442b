use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method, Request},
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

use crate::admission::Gateway;

pub mod handlers;
mod openapi;

pub use openapi::{openapi, ApiDoc};

use handlers::{admissions, health, passkey, root};

/// Settings that change handler behavior rather than the state machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiConfig {
    /// Serve `GET /v1/passkey`. Off by default since it hands out the secret.
    pub expose_passkey: bool,
}

/// Build the router with every route and the shared middleware stack.
#[must_use]
pub fn router(gateway: Arc<Gateway>, config: ApiConfig) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");

    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, x_request_id.clone()])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_origin(Any);

    Router::new()
        .route("/", get(root::root))
        .route("/health", get(health::health).options(health::health))
        .route(
            "/v1/admissions",
            post(admissions::register).get(admissions::list),
        )
        .route(
            "/v1/admissions/:username",
            get(admissions::status).delete(admissions::remove),
        )
        .route(
            "/v1/admissions/:username/approve",
            post(admissions::approve),
        )
        .route("/v1/admissions/:username/deny", post(admissions::deny))
        .route("/v1/admissions/:username/ban", post(admissions::ban))
        .route("/v1/admissions/:username/unban", post(admissions::unban))
        .route("/v1/admissions/:username/rename", post(admissions::rename))
        .route("/v1/passkey", get(passkey::current).put(passkey::rotate))
        .route("/v1/passkey/verify", post(passkey::verify))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    x_request_id.clone(),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(gateway))
                .layer(Extension(config)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to bind or serve
pub async fn new(port: u16, gateway: Arc<Gateway>, config: ApiConfig) -> Result<()> {
    let app = router(gateway, config);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
