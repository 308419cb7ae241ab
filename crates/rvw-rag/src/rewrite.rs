//! History-aware query rewriting

use std::sync::Arc;

use rvw_core::{ChatMessage, LlmClient, Prompt, Result};

/// Instruction given to the rewriter model
pub const REWRITE_SYSTEM_PROMPT: &str =
    "Given the chat history and user question, rewrite it as a standalone question.";

/// Turns a follow-up question into one that reads on its own
pub struct QueryRewriter {
    llm: Arc<dyn LlmClient>,
}

impl QueryRewriter {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Prompt sent to the rewriter model
    pub fn build_prompt(question: &str, history: &[ChatMessage]) -> Prompt {
        Prompt {
            system: REWRITE_SYSTEM_PROMPT.to_string(),
            history: history.to_vec(),
            user: question.to_string(),
        }
    }

    /// Rewrite `question` given the prior turns.
    ///
    /// A blank completion yields the original question.
    pub async fn rewrite(&self, question: &str, history: &[ChatMessage]) -> Result<String> {
        let prompt = Self::build_prompt(question, history);
        let completion = self.llm.generate(&prompt).await?;
        let standalone = completion.trim();

        if standalone.is_empty() {
            tracing::debug!("Empty rewrite, using original question");
            return Ok(question.to_string());
        }
        Ok(standalone.to_string())
    }
}
