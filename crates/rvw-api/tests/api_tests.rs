//! API Integration Tests
//!
//! Drive the router in-process with a stub review store and stub models.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use rvw_api::{create_router, AppState};
use rvw_core::{AppConfig, DocumentStore, LlmClient, Prompt, Result, ReviewDocument, RvwError};
use rvw_rag::{ConversationalRag, SessionStore};
use serde_json::Value;
use tower::ServiceExt;

// =============================================================================
// Stubs
// =============================================================================

struct StubStore {
    searches: AtomicUsize,
}

#[async_trait]
impl DocumentStore for StubStore {
    async fn upsert(&self, _documents: &[ReviewDocument]) -> Result<()> {
        Ok(())
    }

    async fn search(&self, _query: &str, k: usize) -> Result<Vec<ReviewDocument>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let docs = vec![
            ReviewDocument::new("Great bass, decent battery", "BoAt Rockerz 255"),
            ReviewDocument::new("Comfortable fit", "OnePlus Bullets Z2"),
        ];
        Ok(docs.into_iter().take(k).collect())
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Replies with the human turn and how many prior messages it saw
struct StubLlm {
    fail: bool,
}

#[async_trait]
impl LlmClient for StubLlm {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        if self.fail {
            return Err(RvwError::remote_status("groq", 401, "invalid api key"));
        }
        Ok(format!("{} [history={}]", prompt.user, prompt.history.len()))
    }

    fn model(&self) -> &str {
        "stub-model"
    }
}

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    store: Arc<StubStore>,
}

impl TestApp {
    fn new(answer_fails: bool) -> Self {
        let store = Arc::new(StubStore {
            searches: AtomicUsize::new(0),
        });
        let rag = ConversationalRag::new(
            store.clone(),
            Arc::new(StubLlm { fail: false }),
            Arc::new(StubLlm { fail: answer_fails }),
            SessionStore::default(),
        );
        let state = Arc::new(AppState::with_rag(AppConfig::default(), rag).unwrap());
        Self {
            router: create_router(state.clone()),
            state,
            store,
        }
    }

    fn uninitialized() -> Self {
        let state = Arc::new(AppState::new(AppConfig::default()).unwrap());
        Self {
            router: create_router(state.clone()),
            state,
            store: Arc::new(StubStore {
                searches: AtomicUsize::new(0),
            }),
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Option<String>, String) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    async fn get(&self, uri: &str) -> (StatusCode, Option<String>, String) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn chat(&self, form: &str) -> (StatusCode, Option<String>, String) {
        self.send(
            Request::builder()
                .method("POST")
                .uri("/get")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap(),
        )
        .await
    }
}

fn counter(metrics: &str, name: &str) -> u64 {
    metrics
        .lines()
        .find_map(|line| line.strip_prefix(name)?.strip_prefix(' '))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or_else(|| panic!("{name} missing from metrics output"))
}

// =============================================================================
// Chat
// =============================================================================

#[tokio::test]
async fn test_index_serves_chat_page() {
    let app = TestApp::new(false);
    let (status, content_type, body) = app.get("/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/html"));
    assert!(body.contains("name=\"msg\""));
}

#[tokio::test]
async fn test_chat_returns_plain_text_answer() {
    let app = TestApp::new(false);
    let (status, content_type, body) = app.chat("msg=Which+earbuds+have+good+bass%3F").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/plain"));
    assert_eq!(body, "Which earbuds have good bass? [history=0]");
    assert_eq!(app.store.searches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let app = TestApp::new(false);

    for form in ["msg=", "msg=+++", ""] {
        let (status, _, body) = app.chat(form).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"], "Empty message");
    }

    assert_eq!(app.store.searches.load(Ordering::SeqCst), 0);
    let rag = app.state.get_rag().await.unwrap();
    assert_eq!(rag.sessions().session_count().await, 0);
}

#[tokio::test]
async fn test_bodyless_post_is_an_empty_message() {
    let app = TestApp::new(false);

    let (status, _, body) = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/get")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"], "Empty message");

    let (status, _, _) = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/get")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"msg":"hello"}"#))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.store.searches.load(Ordering::SeqCst), 0);

    let (_, _, metrics) = app.get("/metrics").await;
    assert_eq!(counter(&metrics, "rag_requests_total"), 2);
}

#[tokio::test]
async fn test_default_session_accumulates_history() {
    let app = TestApp::new(false);

    let (_, _, first) = app.chat("msg=first").await;
    let (_, _, second) = app.chat("msg=second").await;

    assert_eq!(first, "first [history=0]");
    assert_eq!(second, "second [history=2]");

    let rag = app.state.get_rag().await.unwrap();
    assert_eq!(rag.sessions().history("user-session").await.len(), 4);
}

#[tokio::test]
async fn test_explicit_sessions_are_isolated() {
    let app = TestApp::new(false);

    app.chat("msg=hello&session_id=alice").await;
    app.chat("msg=again&session_id=alice").await;
    let (_, _, bob) = app.chat("msg=hello&session_id=bob").await;

    assert_eq!(bob, "hello [history=0]");
    let rag = app.state.get_rag().await.unwrap();
    assert_eq!(rag.sessions().history("alice").await.len(), 4);
    assert_eq!(rag.sessions().history("bob").await.len(), 2);
    assert!(rag.sessions().history("user-session").await.is_empty());
}

#[tokio::test]
async fn test_upstream_failure_maps_to_bad_gateway() {
    let app = TestApp::new(true);
    let (status, _, body) = app.chat("msg=hello").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["code"], "UPSTREAM_ERROR");

    let rag = app.state.get_rag().await.unwrap();
    assert!(rag.sessions().history("user-session").await.is_empty());
}

#[tokio::test]
async fn test_chat_before_initialization() {
    let app = TestApp::uninitialized();
    let (status, _, body) = app.chat("msg=hello").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["code"], "NOT_READY");
}

// =============================================================================
// Health and Readiness
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::uninitialized();
    let (status, _, body) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_follows_initialization() {
    let app = TestApp::uninitialized();
    let (status, _, body) = app.get("/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["ready"], false);

    let ready = TestApp::new(false);
    let (status, _, body) = ready.get("/ready").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["checks"]["rag_initialized"], true);
    assert_eq!(json["checks"]["vector_store"], "stub");
}

// =============================================================================
// Metrics
// =============================================================================

#[tokio::test]
async fn test_metrics_counts_requests() {
    let app = TestApp::new(false);

    app.get("/health").await;
    app.get("/").await;
    app.chat("msg=").await;
    app.chat("msg=hello").await;

    let (status, content_type, body) = app.get("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/plain"));

    // `/`, two chats, and the scrape itself; health probes are excluded
    assert_eq!(counter(&body, "http_requests_total"), 4);
    assert_eq!(counter(&body, "rag_requests_total"), 2);
}

#[tokio::test]
async fn test_metrics_are_monotonic() {
    let app = TestApp::new(false);
    let mut last_http = 0;
    let mut last_rag = 0;

    for i in 0..5 {
        if i % 2 == 0 {
            app.chat("msg=ping").await;
        }
        let (_, _, body) = app.get("/metrics").await;
        let http = counter(&body, "http_requests_total");
        let rag = counter(&body, "rag_requests_total");

        assert!(http > last_http);
        assert!(rag >= last_rag);
        assert!(rag <= http);
        last_http = http;
        last_rag = rag;
    }
}

// =============================================================================
// OpenAPI
// =============================================================================

#[tokio::test]
async fn test_openapi_document() {
    let app = TestApp::uninitialized();
    let (status, _, body) = app.get("/api-docs/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert!(json["paths"]["/get"].is_object());
    assert!(json["paths"]["/metrics"].is_object());
}
