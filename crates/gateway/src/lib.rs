//! HTTP gateway for codehelper.
//!
//! Serves the front-end SSE endpoint, the v1 JSON API and a health check
//! from one shared [`Assistant`](codehelper_agent::Assistant).
//!
//! Built on Axum.

pub mod api_v1;
pub mod frontend;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use codehelper_config::AppConfig;
use codehelper_core::event::EventBus;

/// CORS layer for the configured front-end origins. An empty list allows any origin.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    if allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// Build the full router: `/health`, `/api/ai/*` and `/v1/*`.
pub fn build_router(state: api_v1::SharedApiState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(state.clone()))
        .merge(frontend::frontend_router(state))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors_layer(allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let provider = codehelper_providers::build_from_config(&config)?;
    let tools = codehelper_tools::build_registry(&config).await;
    let event_bus = Arc::new(EventBus::default());
    let assistant = codehelper_agent::build_assistant(&config, provider, tools, event_bus).await?;

    let state = Arc::new(api_v1::ApiV1State {
        assistant: Arc::new(assistant),
        start_time: chrono::Utc::now(),
    });
    let app = build_router(state, &config.gateway.allowed_origins);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
