//! Embedding client for generating vector representations
//!
//! Supports the HuggingFace Inference API, OpenAI and Ollama embedding APIs,
//! plus a local feature-hashing embedder for offline use.

use std::time::Duration;

use async_trait::async_trait;
use rvw_core::{EmbeddingConfig, EmbeddingProvider, Result, RvwError};
use reqwest::Client;
use serde::{Deserialize, Serialize};

// ============================================================================
// Embedding Trait
// ============================================================================

/// Trait for embedding generation
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RvwError::remote(self.service(), "No embedding returned"))
    }

    /// Generate embeddings for multiple texts (batch), in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimension
    fn dimension(&self) -> usize;

    /// Service name used in errors and logs
    fn service(&self) -> &str;
}

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RvwError::Config(format!("Failed to build HTTP client: {e}")))
}

async fn error_for_status(service: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response.text().await.unwrap_or_default();
    Err(RvwError::remote_status(service, status.as_u16(), error_text))
}

// ============================================================================
// HuggingFace Embedding Client
// ============================================================================

/// HuggingFace Inference API feature-extraction client
pub struct HuggingFaceEmbedding {
    client: Client,
    token: String,
    url: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a [String],
}

/// Sentence-transformer models return one pooled vector per input; plain
/// transformer models return one vector per token.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureExtractionResponse {
    Pooled(Vec<Vec<f32>>),
    TokenLevel(Vec<Vec<Vec<f32>>>),
}

impl FeatureExtractionResponse {
    fn into_embeddings(self) -> Vec<Vec<f32>> {
        match self {
            Self::Pooled(vectors) => vectors,
            Self::TokenLevel(per_input) => per_input.into_iter().map(mean_pool).collect(),
        }
    }
}

fn mean_pool(tokens: Vec<Vec<f32>>) -> Vec<f32> {
    let Some(width) = tokens.first().map(Vec::len) else {
        return Vec::new();
    };
    let mut pooled = vec![0.0f32; width];
    for token in &tokens {
        for (acc, value) in pooled.iter_mut().zip(token) {
            *acc += value;
        }
    }
    let count = tokens.len() as f32;
    pooled.iter_mut().for_each(|v| *v /= count);
    pooled
}

impl HuggingFaceEmbedding {
    const SERVICE: &'static str = "huggingface-embeddings";

    /// Create a client for a hosted feature-extraction model
    pub fn new(token: impl Into<String>, model: &str, dimension: usize) -> Result<Self> {
        Ok(Self {
            client: http_client(30)?,
            token: token.into(),
            url: format!(
                "https://router.huggingface.co/hf-inference/models/{model}/pipeline/feature-extraction"
            ),
            dimension,
        })
    }

    /// Create from config
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let token = config.huggingface_token.as_ref().ok_or_else(|| {
            RvwError::Config("HuggingFace API token required".to_string())
        })?;

        let mut client = Self::new(token.clone(), &config.model, config.dimension)?;
        client.client = http_client(config.timeout_secs)?;
        if let Some(url) = &config.base_url {
            client.url = url.clone();
        }
        Ok(client)
    }
}

#[async_trait]
impl EmbeddingClient for HuggingFaceEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&FeatureExtractionRequest { inputs: texts })
            .send()
            .await
            .map_err(|e| RvwError::remote(Self::SERVICE, format!("Request failed: {e}")))?;

        let result: FeatureExtractionResponse = error_for_status(Self::SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| {
                RvwError::remote(Self::SERVICE, format!("Failed to parse response: {e}"))
            })?;

        let embeddings = result.into_embeddings();
        if embeddings.len() != texts.len() {
            return Err(RvwError::remote(
                Self::SERVICE,
                format!("Expected {} embeddings, got {}", texts.len(), embeddings.len()),
            ));
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn service(&self) -> &str {
        Self::SERVICE
    }
}

// ============================================================================
// OpenAI Embedding Client
// ============================================================================

/// OpenAI embedding API client
pub struct OpenAiEmbedding {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiEmbedding {
    const SERVICE: &'static str = "openai-embeddings";

    /// Create a new OpenAI embedding client
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        let dimension = match model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536, // text-embedding-3-small, text-embedding-ada-002
        };

        Ok(Self {
            client: http_client(30)?,
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model,
            dimension,
        })
    }

    /// Create from config
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| RvwError::Config("OpenAI API key required".to_string()))?;

        let mut client = Self::new(api_key.clone(), config.model.clone())?;
        client.client = http_client(config.timeout_secs)?;
        if let Some(url) = &config.base_url {
            client.base_url = url.trim_end_matches('/').to_string();
        }
        Ok(client)
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = OpenAiEmbeddingRequest {
            input: texts,
            model: &self.model,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RvwError::remote(Self::SERVICE, format!("Request failed: {e}")))?;

        let result: OpenAiEmbeddingResponse = error_for_status(Self::SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| {
                RvwError::remote(Self::SERVICE, format!("Failed to parse response: {e}"))
            })?;

        // Sort by index and extract embeddings
        let mut embeddings = result.data;
        embeddings.sort_by_key(|e| e.index);

        Ok(embeddings.into_iter().map(|e| e.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn service(&self) -> &str {
        Self::SERVICE
    }
}

// ============================================================================
// Ollama Embedding Client
// ============================================================================

/// Ollama embedding API client
pub struct OllamaEmbedding {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedding {
    const SERVICE: &'static str = "ollama-embeddings";

    /// Create a new Ollama embedding client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        let dimension = match model.as_str() {
            "mxbai-embed-large" => 1024,
            "all-minilm" => 384,
            _ => 768, // nomic-embed-text and most others
        };

        Ok(Self {
            client: http_client(30)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model,
            dimension,
        })
    }

    /// Create from config
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let mut client = Self::new(config.ollama_url.clone(), config.model.clone())?;
        client.client = http_client(config.timeout_secs)?;
        Ok(client)
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = OllamaEmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| RvwError::remote(Self::SERVICE, format!("Request failed: {e}")))?;

        let result: OllamaEmbeddingResponse = error_for_status(Self::SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| {
                RvwError::remote(Self::SERVICE, format!("Failed to parse response: {e}"))
            })?;

        Ok(result.embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Ollama doesn't have native batch embedding, so we process sequentially
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn service(&self) -> &str {
        Self::SERVICE
    }
}

// ============================================================================
// Hashing Embedding
// ============================================================================

/// Deterministic bag-of-words embedder using signed feature hashing.
///
/// Vectors are L2-normalized, so identical texts have cosine similarity 1.0
/// and texts sharing no token have similarity 0.0.
#[derive(Debug, Clone)]
pub struct HashingEmbedding {
    dimension: usize,
}

impl HashingEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Embed synchronously
    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            let slot = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vector[slot] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

/// FNV-1a, stable across builds so stored vectors stay comparable
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl EmbeddingClient for HashingEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn service(&self) -> &str {
        "hashing-embeddings"
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an embedding client from config
pub fn create_embedding_client(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingClient>> {
    match config.provider {
        EmbeddingProvider::HuggingFace => Ok(Box::new(HuggingFaceEmbedding::from_config(config)?)),
        EmbeddingProvider::OpenAI => Ok(Box::new(OpenAiEmbedding::from_config(config)?)),
        EmbeddingProvider::Ollama => Ok(Box::new(OllamaEmbedding::from_config(config)?)),
        EmbeddingProvider::Hashing => Ok(Box::new(HashingEmbedding::new(config.dimension))),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_dimension() {
        let client = OpenAiEmbedding::new("test-key", "text-embedding-3-small").unwrap();
        assert_eq!(client.dimension(), 1536);

        let client = OpenAiEmbedding::new("test-key", "text-embedding-3-large").unwrap();
        assert_eq!(client.dimension(), 3072);
    }

    #[test]
    fn test_ollama_dimension() {
        let client = OllamaEmbedding::new("http://localhost:11434/", "nomic-embed-text").unwrap();
        assert_eq!(client.dimension(), 768);
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_huggingface_url() {
        let client = HuggingFaceEmbedding::new("hf_x", "BAAI/bge-base-en-v1.5", 768).unwrap();
        assert!(client
            .url
            .ends_with("/models/BAAI/bge-base-en-v1.5/pipeline/feature-extraction"));
        assert_eq!(client.dimension(), 768);
    }

    #[test]
    fn test_huggingface_requires_token() {
        let config = EmbeddingConfig::default();
        assert!(matches!(
            HuggingFaceEmbedding::from_config(&config),
            Err(RvwError::Config(_))
        ));
    }

    #[test]
    fn test_feature_extraction_response_shapes() {
        let pooled: FeatureExtractionResponse =
            serde_json::from_str("[[0.1, 0.2], [0.3, 0.4]]").unwrap();
        assert_eq!(pooled.into_embeddings(), vec![vec![0.1, 0.2], vec![0.3, 0.4]]);

        let tokens: FeatureExtractionResponse =
            serde_json::from_str("[[[1.0, 2.0], [3.0, 4.0]]]").unwrap();
        assert_eq!(tokens.into_embeddings(), vec![vec![2.0, 3.0]]);
    }

    #[test]
    fn test_hashing_is_deterministic_and_normalized() {
        let embedder = HashingEmbedding::new(64);
        let a = embedder.vectorize("Great battery life");
        let b = embedder.vectorize("great BATTERY, life!");
        assert_eq!(a, b);

        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_empty_text_is_zero() {
        let embedder = HashingEmbedding::new(16);
        assert!(embedder.vectorize("  ...  ").iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn test_hashing_batch_preserves_order() {
        let embedder = HashingEmbedding::new(32);
        let texts = vec!["one".to_string(), "two".to_string()];
        let vectors = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors[0], embedder.vectorize("one"));
        assert_eq!(vectors[1], embedder.vectorize("two"));
        assert_eq!(embedder.embed("one").await.unwrap(), vectors[0]);
    }
}
