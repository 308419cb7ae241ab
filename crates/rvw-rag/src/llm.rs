//! LLM Client implementations
//!
//! Chat-completion clients for OpenAI-compatible APIs (Groq, OpenAI) and
//! Ollama. Both send the structured `Prompt` as a list of role-tagged
//! messages.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rvw_core::{LlmClient, LlmConfig, LlmProvider, Prompt, Result, RvwError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Message {
    role: String,
    content: String,
}

fn messages(prompt: &Prompt) -> Vec<Message> {
    prompt
        .turns()
        .into_iter()
        .map(|(role, content)| Message {
            role: role.to_string(),
            content: content.to_string(),
        })
        .collect()
}

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RvwError::Config(format!("Failed to build HTTP client: {e}")))
}

fn request_error(service: &str, timeout_secs: u64, err: reqwest::Error) -> RvwError {
    if err.is_timeout() {
        RvwError::Timeout {
            service: service.to_string(),
            timeout_ms: timeout_secs * 1000,
        }
    } else {
        RvwError::remote(service, format!("Request failed: {err}"))
    }
}

// ============================================================================
// OpenAI-compatible Client
// ============================================================================

/// Client for the `/chat/completions` API (OpenAI, Groq)
pub struct OpenAiClient {
    client: Client,
    service: String,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

impl OpenAiClient {
    /// Create a new client against the public OpenAI endpoint
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(60)?,
            service: "openai".to_string(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            max_tokens,
            temperature,
            timeout_secs: 60,
        })
    }

    /// Create from config, answering with `model`
    pub fn from_config(config: &LlmConfig, model: &str) -> Result<Self> {
        let api_key = config.api_key().ok_or_else(|| {
            RvwError::Config(format!("API key required for provider {:?}", config.provider))
        })?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            service: match config.provider {
                LlmProvider::Groq => "groq",
                _ => "openai",
            }
            .to_string(),
            api_key: api_key.to_string(),
            base_url: config.base_url(),
            model: model.to_string(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Set custom base URL (for Groq or other compatible APIs)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: messages(prompt),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(&self.service, self.timeout_secs, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RvwError::remote_status(
                &self.service,
                status.as_u16(),
                error_text,
            ));
        }

        let result: ChatCompletionResponse = response.json().await.map_err(|e| {
            RvwError::remote(&self.service, format!("Failed to parse response: {e}"))
        })?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| RvwError::remote(&self.service, "No response generated"))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Ollama Client
// ============================================================================

/// Ollama `/api/chat` client
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: Message,
}

impl OllamaClient {
    const SERVICE: &'static str = "ollama";

    /// Create a new Ollama client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: http_client(60)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: 1.0,
            timeout_secs: 60,
        })
    }

    /// Create from config, answering with `model`
    pub fn from_config(config: &LlmConfig, model: &str) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.base_url(),
            model: model.to_string(),
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let request = OllamaRequest {
            model: &self.model,
            messages: messages(prompt),
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(Self::SERVICE, self.timeout_secs, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RvwError::remote_status(
                Self::SERVICE,
                status.as_u16(),
                error_text,
            ));
        }

        let result: OllamaResponse = response.json().await.map_err(|e| {
            RvwError::remote(Self::SERVICE, format!("Failed to parse Ollama response: {e}"))
        })?;

        Ok(result.message.content)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an LLM client for `model` using the configured provider
pub fn create_llm_client(config: &LlmConfig, model: &str) -> Result<Box<dyn LlmClient>> {
    match config.provider {
        LlmProvider::Groq | LlmProvider::OpenAI => {
            Ok(Box::new(OpenAiClient::from_config(config, model)?))
        }
        LlmProvider::Ollama => Ok(Box::new(OllamaClient::from_config(config, model)?)),
    }
}

// ============================================================================
// Tests
// ============================================================================
