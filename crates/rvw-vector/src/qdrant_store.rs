//! Qdrant implementation of the vector index
//!
//! Points carry the review text and product name as payload; the collection
//! uses cosine distance.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use rvw_core::{Result, ReviewDocument, RvwError, VectorStoreConfig};

use crate::{ScoredDocument, VectorIndex, VectorRecord};

const SERVICE: &str = "qdrant";

/// Qdrant vector index
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
}

impl QdrantIndex {
    /// Connect to Qdrant (the connection is established lazily)
    pub fn from_config(config: &VectorStoreConfig) -> Result<Self> {
        let client = Qdrant::from_url(&config.qdrant_url)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RvwError::Config(format!("Qdrant client setup failed: {e}")))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
        })
    }

    fn payload(document: &ReviewDocument) -> HashMap<String, Value> {
        HashMap::from([
            ("text".to_string(), Value::from(document.text.clone())),
            (
                "product_name".to_string(),
                Value::from(document.product_name.clone()),
            ),
        ])
    }

    fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
        payload.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| RvwError::remote(SERVICE, format!("Failed to list collections: {e}")))?;

        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection);

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection).vectors_config(
                        VectorParamsBuilder::new(dimension as u64, Distance::Cosine),
                    ),
                )
                .await
                .map_err(|e| {
                    RvwError::remote(SERVICE, format!("Failed to create collection: {e}"))
                })?;
            tracing::info!(collection = %self.collection, dimension, "Created Qdrant collection");
        }

        Ok(())
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let points: Vec<PointStruct> = records
            .iter()
            .map(|record| {
                PointStruct::new(
                    record.id.to_string(),
                    record.vector.clone(),
                    Self::payload(&record.document),
                )
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| RvwError::remote(SERVICE, format!("Failed to upsert points: {e}")))?;

        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredDocument>> {
        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, vector.to_vec(), limit as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| RvwError::remote(SERVICE, format!("Vector search failed: {e}")))?;

        let hits = results
            .result
            .into_iter()
            .filter_map(|point| {
                let text = Self::payload_str(&point.payload, "text")?;
                let product_name =
                    Self::payload_str(&point.payload, "product_name").unwrap_or_default();
                Some(ScoredDocument {
                    document: ReviewDocument::new(text, product_name),
                    score: point.score,
                })
            })
            .collect();

        Ok(hits)
    }

    fn backend(&self) -> &str {
        SERVICE
    }
}
