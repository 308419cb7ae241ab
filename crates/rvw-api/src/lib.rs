//! RVW API - HTTP chat service
//!
//! Serves the chat page, answers chat messages through the conversational
//! RAG orchestrator, and exposes health, readiness and Prometheus endpoints.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::{create_router, ApiDoc};
pub use state::AppState;
