//! Review ingestion: converter output into the document store

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rvw_core::{DocumentStore, Result, ReviewDocument};
use rvw_parser::ReviewConverter;
use serde::Serialize;

/// Outcome of one ingestion run
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub path: Option<PathBuf>,
    pub documents: usize,
    pub elapsed_ms: u64,
}

/// Loads review files and writes them to a `DocumentStore`
pub struct DataIngestor {
    store: Arc<dyn DocumentStore>,
}

impl DataIngestor {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Convert the file at `path` and upsert every document
    pub async fn ingest_path(&self, path: &Path) -> Result<IngestReport> {
        let converter = ReviewConverter::new(path);
        let documents = tokio::task::spawn_blocking(move || converter.convert())
            .await
            .map_err(|e| anyhow::anyhow!("conversion task failed: {e}"))??;

        let mut report = self.ingest_documents(&documents).await?;
        report.path = Some(path.to_path_buf());
        Ok(report)
    }

    /// Upsert already converted documents
    pub async fn ingest_documents(&self, documents: &[ReviewDocument]) -> Result<IngestReport> {
        let start = Instant::now();
        self.store.upsert(documents).await?;

        let report = IngestReport {
            path: None,
            documents: documents.len(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        tracing::info!(
            store = self.store.name(),
            documents = report.documents,
            elapsed_ms = report.elapsed_ms,
            "Ingestion complete"
        );
        Ok(report)
    }
}
