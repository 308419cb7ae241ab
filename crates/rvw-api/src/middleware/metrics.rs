//! Metrics tracking middleware
//!
//! Counts requests and records per-endpoint status and latency for Prometheus.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

/// Paths excluded from `http_requests_total`
const UNCOUNTED_PATHS: &[&str] = &["/health"];

/// Label for requests that matched no route
const UNMATCHED_ENDPOINT: &str = "unmatched";

/// Metrics tracking middleware
///
/// `http_requests_total` is incremented before the handler runs, so a
/// `/metrics` scrape includes itself.
pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let endpoint = endpoint_label(
        request
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str),
    );

    if counts_toward_total(request.uri().path()) {
        state.metrics.http_requests.inc();
    }

    let response = next.run(request).await;

    state.metrics.record_request(
        &endpoint,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

/// Route template for metrics labels; unknown paths share one label
fn endpoint_label(matched: Option<&str>) -> String {
    matched.unwrap_or(UNMATCHED_ENDPOINT).to_string()
}

fn counts_toward_total(path: &str) -> bool {
    !UNCOUNTED_PATHS.contains(&path)
}
