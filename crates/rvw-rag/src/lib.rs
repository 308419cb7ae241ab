//! RVW RAG - Conversational retrieval-augmented generation
//!
//! One turn runs as a fixed sequence of stages:
//! rewrite → retrieve → assemble context → build prompt → generate → persist.
//! The session lock is held across all of them, and history changes only
//! after the answer has been generated.

use std::sync::Arc;
use std::time::Instant;

use rvw_core::{
    AppConfig, ChatMessage, DocumentStore, LlmClient, Prompt, RagRequest, RagResponse, Result,
    ReviewDocument,
};

pub mod ingest;
pub mod llm;
pub mod retry;
pub mod rewrite;
pub mod session;

pub use ingest::{DataIngestor, IngestReport};
pub use llm::create_llm_client;
pub use retry::CallPolicy;
pub use rewrite::{QueryRewriter, REWRITE_SYSTEM_PROMPT};
pub use session::{Session, SessionHistory, SessionStore};

/// Documents retrieved per question
pub const RETRIEVAL_TOP_K: usize = 3;

/// Separator between retrieved documents in the context block
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Fixed instruction that opens the answering prompt
pub const ANSWER_PREAMBLE: &str = "You're an e-commerce assistant answering product-related queries using reviews and titles. Stick to the provided context. Be concise and helpful.\n\n";

/// System instruction for the answering model
///
/// Context and input are inserted in one pass, so braces inside either are
/// kept verbatim.
pub fn answer_system_prompt(context: &str, input: &str) -> String {
    format!("{ANSWER_PREAMBLE}CONTEXT:\n{context}\n\nQUESTION: {input}")
}

// ============================================================================
// Prompt Assembly
// ============================================================================

/// Join document texts in ranked order
pub fn format_context(documents: &[ReviewDocument]) -> String {
    documents
        .iter()
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Builder for the answering prompt
#[derive(Debug, Default)]
pub struct PromptBuilder {
    context: String,
    input: String,
    history: Vec<ChatMessage>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the assembled context block
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Set the user's original input
    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.input = input.into();
        self
    }

    /// Set the prior turns
    pub fn history(mut self, history: &[ChatMessage]) -> Self {
        self.history = history.to_vec();
        self
    }

    /// Build the final prompt
    pub fn build(self) -> Prompt {
        let system = answer_system_prompt(&self.context, &self.input);

        Prompt {
            system,
            history: self.history,
            user: self.input,
        }
    }
}

// ============================================================================
// RAG Orchestrator
// ============================================================================

/// History-aware RAG over the review store
pub struct ConversationalRag {
    /// Review document store
    store: Arc<dyn DocumentStore>,

    /// Standalone-question rewriter
    rewriter: QueryRewriter,

    /// Answering model
    answer_llm: Arc<dyn LlmClient>,

    /// Conversation histories
    sessions: SessionStore,

    llm_policy: CallPolicy,
    search_policy: CallPolicy,
}

impl ConversationalRag {
    /// Create a new orchestrator with default call policies
    pub fn new(
        store: Arc<dyn DocumentStore>,
        rewrite_llm: Arc<dyn LlmClient>,
        answer_llm: Arc<dyn LlmClient>,
        sessions: SessionStore,
    ) -> Self {
        Self {
            store,
            rewriter: QueryRewriter::new(rewrite_llm),
            answer_llm,
            sessions,
            llm_policy: CallPolicy::default(),
            search_policy: CallPolicy::default(),
        }
    }

    /// Set the policies for model calls and vector searches
    pub fn with_policies(mut self, llm_policy: CallPolicy, search_policy: CallPolicy) -> Self {
        self.llm_policy = llm_policy;
        self.search_policy = search_policy;
        self
    }

    /// Wire the orchestrator from configuration
    pub fn from_config(config: &AppConfig, store: Arc<dyn DocumentStore>) -> Result<Self> {
        let answer_llm: Arc<dyn LlmClient> =
            create_llm_client(&config.llm, &config.llm.model)?.into();
        let rewrite_llm: Arc<dyn LlmClient> =
            create_llm_client(&config.llm, config.llm.rewrite_model())?.into();

        tracing::info!(
            store = store.name(),
            answer_model = answer_llm.model(),
            rewrite_model = rewrite_llm.model(),
            "RAG orchestrator configured"
        );

        Ok(Self::new(
            store,
            rewrite_llm,
            answer_llm,
            SessionStore::from_config(&config.rag),
        )
        .with_policies(
            CallPolicy::from_config(&config.rag.llm_policy),
            CallPolicy::from_config(&config.rag.search_policy),
        ))
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Answer one user turn and record it in the session history
    pub async fn answer(&self, request: &RagRequest) -> Result<RagResponse> {
        let start_time = Instant::now();
        tracing::info!(session_id = %request.session_id, "RAG request started");

        // 1. Session, locked for the whole turn
        let session = self.sessions.get_or_create(&request.session_id).await;
        let mut history = session.lock().await;

        // 2. Rewrite
        let standalone = self.rewrite(&request.input, history.messages()).await?;
        tracing::debug!(standalone = %standalone, "Question rewritten");

        // 3. Retrieve
        let documents = self.retrieve(&standalone).await?;
        tracing::debug!("Retrieved {} documents", documents.len());

        // 4-5. Assemble context and prompt
        let context = format_context(&documents);
        let prompt = PromptBuilder::new()
            .context(context)
            .input(request.input.as_str())
            .history(history.messages())
            .build();

        // 6. Generate
        tracing::info!("Calling LLM with prompt length: {} chars", prompt.char_len());
        let answer = self.generate(&prompt).await?;
        tracing::info!("LLM response received: {} chars", answer.len());

        // 7. Persist
        history.push(ChatMessage::user(request.input.as_str()));
        history.push(ChatMessage::assistant(answer.as_str()));
        drop(history);

        let processing_time_ms = start_time.elapsed().as_millis() as u64;
        tracing::info!(
            session_id = %request.session_id,
            processing_time_ms,
            "RAG request completed"
        );

        Ok(RagResponse {
            answer,
            standalone_question: standalone,
            sources: documents,
            processing_time_ms,
        })
    }

    async fn rewrite(&self, input: &str, history: &[ChatMessage]) -> Result<String> {
        self.llm_policy
            .run("rewriter", || self.rewriter.rewrite(input, history))
            .await
    }

    async fn retrieve(&self, question: &str) -> Result<Vec<ReviewDocument>> {
        self.search_policy
            .run(self.store.name(), || self.store.search(question, RETRIEVAL_TOP_K))
            .await
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        self.llm_policy
            .run("answer-model", || self.answer_llm.generate(prompt))
            .await
    }
}

// ============================================================================
// Tests
// ============================================================================
