//! RVW Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout the review assistant:
//! - Review documents and chat messages
//! - RAG request/response types
//! - Common error types
//! - Shared traits for the document store and LLM clients
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, CallPolicyConfig, ConfigError, EmbeddingConfig, EmbeddingProvider, IngestConfig,
    LlmConfig, LlmProvider, LoggingConfig, RagConfig, ServerConfig, VectorBackend,
    VectorStoreConfig,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for review assistant operations
#[derive(Error, Debug)]
pub enum RvwError {
    /// Caller supplied unusable input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Malformed ingestion source
    #[error("Data format error: {0}")]
    DataFormat(String),

    /// A remote service (vector store, embedding API, LLM API) failed
    #[error("{service} request failed: {message}")]
    RemoteService {
        service: String,
        status: Option<u16>,
        message: String,
    },

    #[error("{service} request timed out after {timeout_ms}ms")]
    Timeout { service: String, timeout_ms: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RvwError {
    /// Transport-level failure of a remote service (no HTTP status available)
    pub fn remote(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteService {
            service: service.into(),
            status: None,
            message: message.into(),
        }
    }

    /// Remote service answered with a non-success status
    pub fn remote_status(
        service: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::RemoteService {
            service: service.into(),
            status: Some(status),
            message: message.into(),
        }
    }

    /// Whether repeating the same call may succeed.
    ///
    /// Timeouts, transport failures, rate limiting (429) and server errors
    /// (5xx) are transient; every other failure is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::RemoteService { status: None, .. } => true,
            Self::RemoteService {
                status: Some(code), ..
            } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RvwError>;

// ============================================================================
// Review Documents
// ============================================================================

/// A single product review prepared for embedding and retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDocument {
    /// Review body, used as the embedded text
    pub text: String,

    /// Product title the review belongs to
    pub product_name: String,
}

impl ReviewDocument {
    /// Create a new review document
    pub fn new(text: impl Into<String>, product_name: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            product_name: product_name.into(),
        }
    }
}

// ============================================================================
// Conversation
// ============================================================================

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    /// Wire name used by chat-completion APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of a conversation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// A structured chat prompt: system instruction, prior turns, then the human turn
#[derive(Debug, Clone, Default)]
pub struct Prompt {
    pub system: String,
    pub history: Vec<ChatMessage>,
    pub user: String,
}

impl Prompt {
    /// Flatten into `(role, content)` pairs in the order they are sent
    pub fn turns(&self) -> Vec<(&'static str, &str)> {
        let mut turns = Vec::with_capacity(self.history.len() + 2);
        if !self.system.is_empty() {
            turns.push(("system", self.system.as_str()));
        }
        turns.extend(
            self.history
                .iter()
                .map(|m| (m.role.as_str(), m.content.as_str())),
        );
        turns.push(("user", self.user.as_str()));
        turns
    }

    /// Total characters across all turns, for logging
    pub fn char_len(&self) -> usize {
        self.turns().iter().map(|(_, c)| c.len()).sum()
    }
}

// ============================================================================
// RAG Types
// ============================================================================

/// One conversational RAG invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagRequest {
    /// Raw user input, already trimmed by the caller
    pub input: String,

    /// Conversation the input belongs to
    pub session_id: String,
}

impl RagRequest {
    pub fn new(input: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            session_id: session_id.into(),
        }
    }
}

/// Result of a conversational RAG invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResponse {
    /// Generated answer
    pub answer: String,

    /// Question after history-aware rewriting
    pub standalone_question: String,

    /// Retrieved documents, in ranked order
    pub sources: Vec<ReviewDocument>,

    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

// ============================================================================
// Traits
// ============================================================================

/// Gateway to a vector store holding embedded review documents
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Embed and store documents together with their metadata
    async fn upsert(&self, documents: &[ReviewDocument]) -> Result<()>;

    /// Return the `k` most similar documents, most similar first
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ReviewDocument>>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Trait for chat-completion clients
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a single completion for a structured prompt
    async fn generate(&self, prompt: &Prompt) -> Result<String>;

    /// Model identifier, for logging
    fn model(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================
