//! Prometheus exposition endpoint

use std::sync::Arc;

use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::TEXT_FORMAT;

use crate::error::AppError;
use crate::state::AppState;

/// Prometheus-compatible metrics endpoint
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "health",
    responses((status = 200, description = "Prometheus text exposition", body = String))
)]
pub async fn prometheus_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::Internal(format!("metrics encoding failed: {e}")))?;

    Ok(([(header::CONTENT_TYPE, TEXT_FORMAT)], body))
}
