//! Route definitions

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::error::ApiError;
use crate::handlers::{chat, health, metrics};
use crate::middleware::metrics_middleware;
use crate::state::AppState;
use rvw_core::ServerConfig;

/// OpenAPI description of the service
#[derive(OpenApi)]
#[openapi(
    info(title = "rvw-api", description = "Product review assistant"),
    paths(
        chat::index,
        chat::chat,
        health::health_check,
        health::readiness_check,
        metrics::prometheus_metrics
    ),
    components(schemas(
        ApiError,
        chat::ChatForm,
        health::HealthResponse,
        health::ReadinessResponse,
        health::ReadinessChecks
    )),
    tags(
        (name = "chat", description = "Conversational product Q&A"),
        (name = "health", description = "Probes and metrics")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let layer = CorsLayer::new().allow_methods([Method::GET, Method::POST]);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let server = state.config.server.clone();

    let mut router = Router::new()
        .route("/", get(chat::index))
        .route("/get", post(chat::chat))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(metrics::prometheus_metrics))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http());

    if server.cors_enabled {
        router = router.layer(cors_layer(&server));
    }

    router.with_state(state)
}
