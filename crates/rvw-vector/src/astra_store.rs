//! AstraDB implementation of the vector index
//!
//! Talks to the Astra Data API (JSON over HTTPS). Every command is a POST
//! whose body names the command; failures come back in an `errors` array,
//! often with HTTP 200.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rvw_core::{Result, ReviewDocument, RvwError, VectorStoreConfig};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{ScoredDocument, VectorIndex, VectorRecord};

const SERVICE: &str = "astradb";

/// Maximum documents per insertMany command
const INSERT_CHUNK_SIZE: usize = 20;

/// Error code for an `_id` that is already stored
const DOCUMENT_ALREADY_EXISTS: &str = "DOCUMENT_ALREADY_EXISTS";

/// AstraDB vector index
pub struct AstraIndex {
    client: Client,
    endpoint: String,
    token: String,
    keyspace: String,
    collection: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(rename = "errorCode", default)]
    error_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FindResponse {
    data: FindData,
}

#[derive(Debug, Deserialize)]
struct FindData {
    #[serde(default)]
    documents: Vec<StoredDocument>,
}

#[derive(Debug, Deserialize)]
struct StoredDocument {
    content: Option<String>,
    #[serde(default)]
    metadata: StoredMetadata,
    #[serde(rename = "$similarity", default)]
    similarity: f32,
}

#[derive(Debug, Default, Deserialize)]
struct StoredMetadata {
    #[serde(default)]
    product_name: String,
}

impl AstraIndex {
    /// Create a new index client
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        keyspace: impl Into<String>,
        collection: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RvwError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
            keyspace: keyspace.into(),
            collection: collection.into(),
            timeout,
        })
    }

    /// Create from config
    pub fn from_config(config: &VectorStoreConfig) -> Result<Self> {
        let endpoint = config
            .astra_api_endpoint
            .as_ref()
            .ok_or_else(|| RvwError::Config("ASTRA_DB_API_ENDPOINT is required".to_string()))?;
        let token = config.astra_token.as_ref().ok_or_else(|| {
            RvwError::Config("ASTRA_DB_APPLICATION_TOKEN is required".to_string())
        })?;

        Self::new(
            endpoint.clone(),
            token.clone(),
            config.astra_keyspace.clone(),
            config.collection.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn keyspace_url(&self) -> String {
        format!("{}/api/json/v1/{}", self.endpoint, self.keyspace)
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.keyspace_url(), self.collection)
    }

    /// Send a command and return the decoded body
    async fn command(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .header("Token", &self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RvwError::Timeout {
                        service: SERVICE.to_string(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    RvwError::remote(SERVICE, format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RvwError::remote_status(SERVICE, status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| RvwError::remote(SERVICE, format!("Failed to parse response: {e}")))
    }

    /// Fail on any reported error whose code is not in `tolerated`
    fn check_errors(body: &Value, tolerated: &[&str]) -> Result<()> {
        let Some(errors) = body.get("errors") else {
            return Ok(());
        };
        let errors: Vec<ApiError> = serde_json::from_value(errors.clone())
            .map_err(|e| RvwError::remote(SERVICE, format!("Unreadable error list: {e}")))?;

        let fatal: Vec<String> = errors
            .into_iter()
            .filter(|e| {
                e.error_code
                    .as_deref()
                    .map_or(true, |code| !tolerated.contains(&code))
            })
            .map(|e| match e.error_code {
                Some(code) => format!("{code}: {}", e.message),
                None => e.message,
            })
            .collect();

        if fatal.is_empty() {
            Ok(())
        } else {
            // Command-level errors arrive with HTTP 200 and are not transient
            Err(RvwError::remote_status(SERVICE, 200, fatal.join("; ")))
        }
    }

    fn insert_body(records: &[VectorRecord]) -> Value {
        let documents: Vec<Value> = records
            .iter()
            .map(|record| {
                json!({
                    "_id": record.id.to_string(),
                    "content": record.document.text,
                    "metadata": { "product_name": record.document.product_name },
                    "$vector": record.vector,
                })
            })
            .collect();

        json!({ "insertMany": { "documents": documents, "options": { "ordered": false } } })
    }

    fn find_body(vector: &[f32], limit: usize) -> Value {
        json!({
            "find": {
                "sort": { "$vector": vector },
                "projection": { "$vector": 0 },
                "options": { "limit": limit, "includeSimilarity": true },
            }
        })
    }

    fn parse_find(body: Value) -> Result<Vec<ScoredDocument>> {
        let response: FindResponse = serde_json::from_value(body)
            .map_err(|e| RvwError::remote(SERVICE, format!("Unexpected find response: {e}")))?;

        Ok(response
            .data
            .documents
            .into_iter()
            .filter_map(|doc| {
                Some(ScoredDocument {
                    document: ReviewDocument::new(doc.content?, doc.metadata.product_name),
                    score: doc.similarity,
                })
            })
            .collect())
    }
}

#[async_trait]
impl VectorIndex for AstraIndex {
    async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        // createCollection is idempotent for identical options
        let body = json!({
            "createCollection": {
                "name": self.collection,
                "options": { "vector": { "dimension": dimension, "metric": "cosine" } },
            }
        });
        let response = self.command(&self.keyspace_url(), &body).await?;
        Self::check_errors(&response, &[])?;
        tracing::info!(collection = %self.collection, dimension, "AstraDB collection ready");
        Ok(())
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let url = self.collection_url();
        for chunk in records.chunks(INSERT_CHUNK_SIZE) {
            let response = self.command(&url, &Self::insert_body(chunk)).await?;
            // Ids are derived from content, so an existing id already holds this document
            Self::check_errors(&response, &[DOCUMENT_ALREADY_EXISTS])?;
        }
        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredDocument>> {
        let response = self
            .command(&self.collection_url(), &Self::find_body(vector, limit))
            .await?;
        Self::check_errors(&response, &[])?;
        Self::parse_find(response)
    }

    fn backend(&self) -> &str {
        SERVICE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn index() -> AstraIndex {
        AstraIndex::new(
            "https://db-id-region.apps.astra.datastax.com/",
            "AstraCS:token",
            "default_keyspace",
            "flipkart_database",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_urls() {
        let index = index();
        assert_eq!(
            index.collection_url(),
            "https://db-id-region.apps.astra.datastax.com/api/json/v1/default_keyspace/flipkart_database"
        );
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let config = VectorStoreConfig::default();
        assert!(matches!(
            AstraIndex::from_config(&config),
            Err(RvwError::Config(_))
        ));
    }

    #[test]
    fn test_insert_body() {
        let record = VectorRecord {
            id: Uuid::nil(),
            vector: vec![0.5, 0.25],
            document: ReviewDocument::new("Nice", "Phone"),
        };
        let body = AstraIndex::insert_body(&[record]);
        let doc = &body["insertMany"]["documents"][0];
        assert_eq!(doc["content"], "Nice");
        assert_eq!(doc["metadata"]["product_name"], "Phone");
        assert_eq!(doc["$vector"], json!([0.5, 0.25]));
        assert_eq!(body["insertMany"]["options"]["ordered"], false);
    }

    #[test]
    fn test_parse_find() {
        let body = json!({
            "data": { "documents": [
                { "_id": "1", "content": "Loud", "metadata": { "product_name": "Speaker" }, "$similarity": 0.9 },
                { "_id": "2", "metadata": { "product_name": "Broken" } },
                { "_id": "3", "content": "Quiet", "$similarity": 0.4 }
            ]}
        });
        let hits = AstraIndex::parse_find(body).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document, ReviewDocument::new("Loud", "Speaker"));
        assert!((hits[0].score - 0.9).abs() < 1e-6);
        assert_eq!(hits[1].document.product_name, "");
    }

    #[test]
    fn test_check_errors() {
        let ok = json!({ "status": { "insertedIds": [] } });
        assert!(AstraIndex::check_errors(&ok, &[]).is_ok());

        let duplicate = json!({ "errors": [
            { "message": "exists", "errorCode": "DOCUMENT_ALREADY_EXISTS" }
        ]});
        assert!(AstraIndex::check_errors(&duplicate, &[DOCUMENT_ALREADY_EXISTS]).is_ok());
        assert!(AstraIndex::check_errors(&duplicate, &[]).is_err());

        let fatal = json!({ "errors": [{ "message": "Collection does not exist" }] });
        let err = AstraIndex::check_errors(&fatal, &[DOCUMENT_ALREADY_EXISTS]).unwrap_err();
        assert!(err.to_string().contains("Collection does not exist"));
        assert!(!err.is_retryable());
    }
}
