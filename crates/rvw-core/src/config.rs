//! Review assistant configuration
//!
//! Handles configuration from environment variables and TOML config files,
//! with defaults matching the hosted stack (AstraDB, HuggingFace embeddings,
//! Groq chat completions).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Vector store connection
    pub vector: VectorStoreConfig,

    /// Embedding model configuration
    pub embedding: EmbeddingConfig,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Conversational RAG configuration
    pub rag: RagConfig,

    /// Data ingestion configuration
    pub ingest: IngestConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        None => Ok(None),
    }
}

fn parse_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match env_var(key) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        },
        None => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Server
        if let Some(host) = env_var("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_env("API_PORT")? {
            self.server.port = port;
        }
        if let Some(secs) = parse_env("REQUEST_TIMEOUT_SECS")? {
            self.server.request_timeout_secs = secs;
        }
        // CORS origins from environment variable (comma-separated)
        if let Some(origins) = env_var("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Vector store
        if let Some(backend) = env_var("VECTOR_BACKEND") {
            self.vector.backend = backend.parse()?;
        }
        if let Some(collection) = env_var("VECTOR_COLLECTION") {
            self.vector.collection = collection;
        }
        if let Some(url) = env_var("QDRANT_URL") {
            self.vector.qdrant_url = url;
        }
        if let Some(endpoint) = env_var("ASTRA_DB_API_ENDPOINT") {
            self.vector.astra_api_endpoint = Some(endpoint);
        }
        if let Some(token) = env_var("ASTRA_DB_APPLICATION_TOKEN") {
            self.vector.astra_token = Some(token);
        }
        if let Some(keyspace) = env_var("ASTRA_DB_KEYSPACE") {
            self.vector.astra_keyspace = keyspace;
        }

        // Embeddings
        if let Some(provider) = env_var("EMBEDDING_PROVIDER") {
            self.embedding.provider = provider.parse()?;
        }
        if let Some(model) = env_var("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(dimension) = parse_env("EMBEDDING_DIMENSION")? {
            self.embedding.dimension = dimension;
        }
        if let Some(url) = env_var("EMBEDDING_BASE_URL") {
            self.embedding.base_url = Some(url);
        }
        if let Some(token) = env_var("HUGGINGFACEHUB_API_TOKEN") {
            self.embedding.huggingface_token = Some(token);
        }

        // LLM
        if let Some(provider) = env_var("LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        if let Some(key) = env_var("GROQ_API_KEY") {
            self.llm.groq_api_key = Some(key);
        }
        if let Some(key) = env_var("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(key.clone());
            self.embedding.openai_api_key = Some(key);
        }
        if let Some(url) = env_var("LLM_BASE_URL") {
            self.llm.base_url = Some(url);
        }
        if let Some(url) = env_var("OLLAMA_URL") {
            self.llm.ollama_url = url.clone();
            self.embedding.ollama_url = url;
        }
        if let Some(model) = env_var("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(model) = env_var("REWRITE_MODEL") {
            self.llm.rewrite_model = Some(model);
        }
        if let Some(temperature) = parse_env("LLM_TEMPERATURE")? {
            self.llm.temperature = temperature;
        }

        // RAG
        if let Some(session) = env_var("DEFAULT_SESSION_ID") {
            self.rag.default_session_id = session;
        }
        if let Some(secs) = parse_env("SESSION_IDLE_TIMEOUT_SECS")? {
            self.rag.session_idle_timeout_secs = secs;
        }
        if let Some(capacity) = parse_env("SESSION_MAX_CAPACITY")? {
            self.rag.session_max_capacity = capacity;
        }
        if let Some(secs) = parse_env("LLM_TIMEOUT_SECS")? {
            self.rag.llm_policy.timeout_secs = secs;
        }
        if let Some(secs) = parse_env("SEARCH_TIMEOUT_SECS")? {
            self.rag.search_policy.timeout_secs = secs;
        }
        if let Some(attempts) = parse_env("REMOTE_MAX_ATTEMPTS")? {
            self.rag.llm_policy.max_attempts = attempts;
            self.rag.search_policy.max_attempts = attempts;
        }

        // Ingestion
        if let Some(path) = env_var("REVIEWS_PATH") {
            self.ingest.data_path = PathBuf::from(path);
        }
        if let Some(enabled) = parse_bool("INGEST_ON_STARTUP")? {
            self.ingest.on_startup = enabled;
        }

        // Logging
        if let Some(level) = env_var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = env_var("LOG_FORMAT") {
            self.logging.json_format = format.eq_ignore_ascii_case("json");
        }

        Ok(())
    }

    /// Check that every credential the selected providers need is present
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vector.backend == VectorBackend::AstraDb {
            if self.vector.astra_api_endpoint.is_none() {
                return Err(ConfigError::MissingRequired(
                    "ASTRA_DB_API_ENDPOINT".to_string(),
                ));
            }
            if self.vector.astra_token.is_none() {
                return Err(ConfigError::MissingRequired(
                    "ASTRA_DB_APPLICATION_TOKEN".to_string(),
                ));
            }
        }

        match self.embedding.provider {
            EmbeddingProvider::HuggingFace if self.embedding.huggingface_token.is_none() => {
                return Err(ConfigError::MissingRequired(
                    "HUGGINGFACEHUB_API_TOKEN".to_string(),
                ));
            }
            EmbeddingProvider::OpenAI if self.embedding.openai_api_key.is_none() => {
                return Err(ConfigError::MissingRequired("OPENAI_API_KEY".to_string()));
            }
            _ => {}
        }

        match self.llm.provider {
            LlmProvider::Groq if self.llm.groq_api_key.is_none() => Err(
                ConfigError::MissingRequired("GROQ_API_KEY".to_string()),
            ),
            LlmProvider::OpenAI if self.llm.openai_api_key.is_none() => Err(
                ConfigError::MissingRequired("OPENAI_API_KEY".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Whole-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            request_timeout_secs: 120,
            cors_enabled: true,
            cors_origins: vec![],
        }
    }
}

/// Which vector index backs the document store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    AstraDb,
    Qdrant,
    Memory,
}

impl std::str::FromStr for VectorBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "astradb" | "astra" => Ok(Self::AstraDb),
            "qdrant" => Ok(Self::Qdrant),
            "memory" | "in-memory" => Ok(Self::Memory),
            _ => Err(ConfigError::InvalidValue {
                key: "VECTOR_BACKEND".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Vector store connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub backend: VectorBackend,

    /// Collection holding embedded reviews
    pub collection: String,

    /// Qdrant gRPC URL
    pub qdrant_url: String,

    /// AstraDB Data API endpoint
    pub astra_api_endpoint: Option<String>,

    /// AstraDB application token
    pub astra_token: Option<String>,

    /// AstraDB keyspace (namespace)
    pub astra_keyspace: String,

    /// Maximum seconds per vector store request
    pub timeout_secs: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::AstraDb,
            collection: "flipkart_database".to_string(),
            qdrant_url: "http://localhost:6334".to_string(),
            astra_api_endpoint: None,
            astra_token: None,
            astra_keyspace: "default_keyspace".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    HuggingFace,
    OpenAI,
    Ollama,
    /// Local feature hashing, no network
    Hashing,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "huggingface" | "hf" => Ok(Self::HuggingFace),
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "hashing" => Ok(Self::Hashing),
            _ => Err(ConfigError::InvalidValue {
                key: "EMBEDDING_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,

    /// Embedding model name
    pub model: String,

    /// Vector dimension (must match the model and the collection)
    pub dimension: usize,

    /// Override for the provider's API base URL
    pub base_url: Option<String>,

    /// HuggingFace Inference API token
    pub huggingface_token: Option<String>,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::HuggingFace,
            model: "BAAI/bge-base-en-v1.5".to_string(),
            dimension: 768,
            base_url: None,
            huggingface_token: None,
            openai_api_key: None,
            ollama_url: "http://localhost:11434".to_string(),
            timeout_secs: 30,
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM provider to use
    pub provider: LlmProvider,

    /// Groq API key
    pub groq_api_key: Option<String>,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// Override for OpenAI-compatible base URL
    pub base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Model used to answer
    pub model: String,

    /// Model used to rewrite questions (defaults to `model`)
    pub rewrite_model: Option<String>,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// HTTP client timeout in seconds
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// Model used by the query rewriter
    pub fn rewrite_model(&self) -> &str {
        self.rewrite_model.as_deref().unwrap_or(&self.model)
    }

    /// API key for the configured provider, if it needs one
    pub fn api_key(&self) -> Option<&str> {
        match self.provider {
            LlmProvider::Groq => self.groq_api_key.as_deref(),
            LlmProvider::OpenAI => self.openai_api_key.as_deref(),
            LlmProvider::Ollama => None,
        }
    }

    /// OpenAI-compatible base URL for the configured provider
    pub fn base_url(&self) -> String {
        if let Some(url) = &self.base_url {
            return url.trim_end_matches('/').to_string();
        }
        match self.provider {
            LlmProvider::Groq => "https://api.groq.com/openai/v1".to_string(),
            LlmProvider::OpenAI => "https://api.openai.com/v1".to_string(),
            LlmProvider::Ollama => self.ollama_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Groq,
            groq_api_key: None,
            openai_api_key: None,
            base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            rewrite_model: None,
            max_tokens: 1024,
            temperature: 1.0,
            timeout_secs: 60,
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Groq,
    OpenAI,
    Ollama,
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Timeout and retry budget for one kind of remote call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallPolicyConfig {
    /// Per-attempt timeout in seconds
    pub timeout_secs: u64,

    /// Total attempts including the first
    pub max_attempts: usize,

    /// First backoff delay in milliseconds
    pub initial_delay_ms: u64,

    /// Backoff ceiling in milliseconds
    pub max_delay_ms: u64,
}

impl Default for CallPolicyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_attempts: 3,
            initial_delay_ms: 250,
            max_delay_ms: 4_000,
        }
    }
}

/// Conversational RAG configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Session used when a caller does not name one
    pub default_session_id: String,

    /// Evict sessions idle for this long (0 = keep for process lifetime)
    pub session_idle_timeout_secs: u64,

    /// Upper bound on live sessions
    pub session_max_capacity: u64,

    /// Policy for rewriter and answer model calls
    pub llm_policy: CallPolicyConfig,

    /// Policy for vector searches
    pub search_policy: CallPolicyConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            default_session_id: "user-session".to_string(),
            session_idle_timeout_secs: 3600,
            session_max_capacity: 10_000,
            llm_policy: CallPolicyConfig {
                timeout_secs: 60,
                ..Default::default()
            },
            search_policy: CallPolicyConfig::default(),
        }
    }
}

/// Data ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Tabular review source
    pub data_path: PathBuf,

    /// Ingest `data_path` before serving (otherwise reuse the existing collection)
    pub on_startup: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/flipkart_product_review.csv"),
            on_startup: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

impl From<ConfigError> for crate::RvwError {
    fn from(err: ConfigError) -> Self {
        crate::RvwError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.embedding.dimension, 768);
        assert_eq!(config.llm.model, "llama-3.1-8b-instant");
        assert_eq!(config.rag.default_session_id, "user-session");
        assert_eq!(config.vector.collection, "flipkart_database");
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("groq".parse::<LlmProvider>().unwrap(), LlmProvider::Groq);
        assert_eq!(
            "Ollama".parse::<LlmProvider>().unwrap(),
            LlmProvider::Ollama
        );
        assert!("invalid".parse::<LlmProvider>().is_err());

        assert_eq!(
            "astra".parse::<VectorBackend>().unwrap(),
            VectorBackend::AstraDb
        );
        assert_eq!(
            "hf".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::HuggingFace
        );
    }

    #[test]
    fn test_rewrite_model_falls_back_to_answer_model() {
        let mut llm = LlmConfig::default();
        assert_eq!(llm.rewrite_model(), "llama-3.1-8b-instant");

        llm.rewrite_model = Some("llama-3.3-70b-versatile".to_string());
        assert_eq!(llm.rewrite_model(), "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_base_url_per_provider() {
        let mut llm = LlmConfig::default();
        assert_eq!(llm.base_url(), "https://api.groq.com/openai/v1");

        llm.provider = LlmProvider::OpenAI;
        assert_eq!(llm.base_url(), "https://api.openai.com/v1");

        llm.base_url = Some("http://proxy.local/v1/".to_string());
        assert_eq!(llm.base_url(), "http://proxy.local/v1");
    }

    #[test]
    fn test_validate_requires_credentials() {
        let config = AppConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(key)) if key == "ASTRA_DB_API_ENDPOINT"
        ));

        let mut offline = AppConfig::default();
        offline.vector.backend = VectorBackend::Memory;
        offline.embedding.provider = EmbeddingProvider::Hashing;
        offline.llm.provider = LlmProvider::Ollama;
        assert!(offline.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9000

[vector]
backend = "qdrant"

[rag]
default_session_id = "demo"
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.vector.backend, VectorBackend::Qdrant);
        assert_eq!(config.rag.default_session_id, "demo");
        assert_eq!(config.rag.session_idle_timeout_secs, 3600);
    }

    #[test]
    fn test_from_file_missing() {
        let err = AppConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }
}
