//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rvw_core::RvwError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Human-readable message
    pub error: String,
    /// Error code
    pub code: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotReady,
    Upstream(String),
    UpstreamTimeout(String),
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            AppError::BadRequest(msg) => ApiError::new("BAD_REQUEST", msg),
            AppError::NotReady => ApiError::new("NOT_READY", "Service is still initializing"),
            AppError::Upstream(msg) => {
                tracing::error!(error = %msg, "Upstream service failed");
                ApiError::new("UPSTREAM_ERROR", "Upstream service failed")
            }
            AppError::UpstreamTimeout(msg) => {
                tracing::error!(error = %msg, "Upstream service timed out");
                ApiError::new("UPSTREAM_TIMEOUT", "Upstream service timed out")
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ApiError::new("INTERNAL_ERROR", "Internal server error")
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<RvwError> for AppError {
    fn from(err: RvwError) -> Self {
        match err {
            RvwError::Validation(msg) => AppError::BadRequest(msg),
            err @ RvwError::RemoteService { .. } => AppError::Upstream(err.to_string()),
            err @ RvwError::Timeout { .. } => AppError::UpstreamTimeout(err.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (RvwError::Validation("Empty message".into()), StatusCode::BAD_REQUEST),
            (RvwError::remote_status("groq", 500, "boom"), StatusCode::BAD_GATEWAY),
            (
                RvwError::Timeout {
                    service: "astradb".into(),
                    timeout_ms: 30_000,
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (RvwError::DataFormat("bad".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (RvwError::Config("missing".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let response = AppError::Internal("secret path".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    async fn body_of(err: AppError) -> (StatusCode, ApiError) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_upstream_details_are_hidden() {
        let (status, body) = body_of(AppError::from(RvwError::remote_status(
            "groq",
            500,
            "{\"error\":\"key gsk_secret rejected\"}",
        )))
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.code, "UPSTREAM_ERROR");
        assert!(!body.error.contains("gsk_secret"));

        let (status, body) = body_of(AppError::from(RvwError::Timeout {
            service: "astradb".into(),
            timeout_ms: 30_000,
        }))
        .await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body.code, "UPSTREAM_TIMEOUT");
        assert!(!body.error.contains("astradb"));
    }

    #[tokio::test]
    async fn test_bad_request_message_is_returned() {
        let (_, body) = body_of(AppError::BadRequest("Empty message".into())).await;
        assert_eq!(body.error, "Empty message");
    }
}
