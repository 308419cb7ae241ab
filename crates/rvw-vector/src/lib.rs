//! RVW Vector - Vector store gateway
//!
//! Embeds review documents and stores them in a vector index
//! (AstraDB, Qdrant or in-process memory), and answers top-k
//! similarity queries against it.

use std::sync::Arc;

use async_trait::async_trait;
use rvw_core::{AppConfig, DocumentStore, Result, ReviewDocument, RvwError, VectorBackend};
use tokio::sync::OnceCell;
use uuid::Uuid;

pub mod astra_store;
pub mod embedding;
pub mod memory_store;
pub mod qdrant_store;

pub use astra_store::AstraIndex;
pub use embedding::{create_embedding_client, EmbeddingClient, HashingEmbedding};
pub use memory_store::MemoryIndex;
pub use qdrant_store::QdrantIndex;

/// Number of documents embedded per request
pub const EMBEDDING_BATCH_SIZE: usize = 32;

/// A vector with its document
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub document: ReviewDocument,
}

/// A search hit
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: ReviewDocument,
    pub score: f32,
}

/// Trait for vector index operations
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection if it does not exist yet
    async fn ensure_collection(&self, dimension: usize) -> Result<()>;

    /// Insert or replace records by id
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    /// Nearest neighbours by cosine similarity, best first
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredDocument>>;

    /// Backend name for logging
    fn backend(&self) -> &str;
}

/// Stable id for a review: the same product and text always map to the same point
pub fn record_id(document: &ReviewDocument) -> Uuid {
    let key = format!("{}\u{1f}{}", document.product_name, document.text);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
}

// ============================================================================
// Embedding-backed document store
// ============================================================================

/// `DocumentStore` that embeds text with an `EmbeddingClient` and keeps the
/// vectors in a `VectorIndex`
pub struct EmbeddingStore {
    embedder: Arc<dyn EmbeddingClient>,
    index: Arc<dyn VectorIndex>,
    batch_size: usize,
    collection_ready: OnceCell<()>,
}

impl EmbeddingStore {
    pub fn new(embedder: Arc<dyn EmbeddingClient>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            batch_size: EMBEDDING_BATCH_SIZE,
            collection_ready: OnceCell::new(),
        }
    }

    /// Override the embedding batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Search returning similarity scores alongside documents
    pub async fn search_scored(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query).await?;
        self.index.search(&vector, k).await
    }

    async fn ensure_collection(&self) -> Result<()> {
        self.collection_ready
            .get_or_try_init(|| async {
                self.index
                    .ensure_collection(self.embedder.dimension())
                    .await
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for EmbeddingStore {
    async fn upsert(&self, documents: &[ReviewDocument]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        self.ensure_collection().await?;

        for (batch_no, batch) in documents.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(RvwError::remote(
                    self.embedder.service(),
                    format!("Expected {} embeddings, got {}", batch.len(), vectors.len()),
                ));
            }

            let records: Vec<VectorRecord> = batch
                .iter()
                .zip(vectors)
                .map(|(document, vector)| VectorRecord {
                    id: record_id(document),
                    vector,
                    document: document.clone(),
                })
                .collect();

            self.index.upsert(&records).await?;
            tracing::debug!(
                backend = self.index.backend(),
                batch = batch_no,
                size = records.len(),
                "Upserted batch"
            );
        }

        tracing::info!(
            backend = self.index.backend(),
            documents = documents.len(),
            "Documents upserted"
        );
        Ok(())
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<ReviewDocument>> {
        let hits = self.search_scored(query, k).await?;
        Ok(hits.into_iter().map(|hit| hit.document).collect())
    }

    fn name(&self) -> &str {
        self.index.backend()
    }
}

/// Build the configured document store
pub fn create_document_store(config: &AppConfig) -> Result<Arc<dyn DocumentStore>> {
    let embedder: Arc<dyn EmbeddingClient> = create_embedding_client(&config.embedding)?.into();

    let index: Arc<dyn VectorIndex> = match config.vector.backend {
        VectorBackend::AstraDb => Arc::new(AstraIndex::from_config(&config.vector)?),
        VectorBackend::Qdrant => Arc::new(QdrantIndex::from_config(&config.vector)?),
        VectorBackend::Memory => Arc::new(MemoryIndex::new()),
    };

    tracing::info!(
        backend = index.backend(),
        embeddings = embedder.service(),
        dimension = embedder.dimension(),
        "Document store configured"
    );

    Ok(Arc::new(EmbeddingStore::new(embedder, index)))
}
