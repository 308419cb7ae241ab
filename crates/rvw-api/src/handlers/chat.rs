//! Chat page and chat endpoint

use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, State},
    http::header,
    response::{Html, IntoResponse},
    Form,
};
use rvw_core::RagRequest;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::state::AppState;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Form body of `POST /get`
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ChatForm {
    /// User's message
    #[serde(default)]
    #[schema(example = "Which earbuds have the best bass?")]
    pub msg: String,

    /// Conversation to continue (defaults to the shared session)
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Serve the chat page
#[utoipa::path(
    get,
    path = "/",
    tag = "chat",
    responses((status = 200, description = "Chat page", content_type = "text/html"))
)]
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Answer a chat message from the review corpus
#[utoipa::path(
    post,
    path = "/get",
    tag = "chat",
    request_body(content = ChatForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Answer text", body = String, content_type = "text/plain"),
        (status = 400, description = "Empty message", body = ApiError),
        (status = 502, description = "Upstream service failed", body = ApiError),
        (status = 503, description = "Service not initialized", body = ApiError),
        (status = 504, description = "Upstream service timed out", body = ApiError)
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    form: Result<Form<ChatForm>, FormRejection>,
) -> Result<impl IntoResponse, AppError> {
    state.metrics.rag_requests.inc();

    // A missing or unreadable body is treated as an empty message
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unreadable chat form");
            ChatForm::default()
        }
    };

    let input = form.msg.trim();
    if input.is_empty() {
        return Err(AppError::BadRequest("Empty message".to_string()));
    }

    let rag = state.get_rag().await.ok_or(AppError::NotReady)?;

    let session_id = form
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| state.default_session_id());

    let response = rag.answer(&RagRequest::new(input, session_id)).await?;
    tracing::info!(
        session_id,
        sources = response.sources.len(),
        processing_time_ms = response.processing_time_ms,
        "Chat answered"
    );

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        response.answer,
    )
        .into_response())
}
