//! In-process vector index
//!
//! Brute-force cosine search over a vector kept behind a lock. Intended for
//! tests and small datasets.

use std::collections::HashMap;

use async_trait::async_trait;
use rvw_core::Result;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{ScoredDocument, VectorIndex, VectorRecord};

/// Records in insertion order plus an id -> position lookup
#[derive(Default)]
struct Entries {
    records: Vec<VectorRecord>,
    positions: HashMap<Uuid, usize>,
}

/// Memory-backed vector index
#[derive(Default)]
pub struct MemoryIndex {
    entries: RwLock<Entries>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.entries.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.records.is_empty()
    }
}

/// Cosine similarity; zero vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_collection(&self, _dimension: usize) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let mut entries = self.entries.write().await;
        let Entries { records: stored, positions } = &mut *entries;
        for record in records {
            match positions.get(&record.id) {
                Some(&position) => stored[position] = record.clone(),
                None => {
                    positions.insert(record.id, stored.len());
                    stored.push(record.clone());
                }
            }
        }
        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredDocument>> {
        let entries = self.entries.read().await;
        let mut hits: Vec<ScoredDocument> = entries
            .records
            .iter()
            .map(|record| ScoredDocument {
                document: record.document.clone(),
                score: cosine_similarity(vector, &record.vector),
            })
            .collect();

        // Stable sort: ties keep insertion order
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    fn backend(&self) -> &str {
        "memory"
    }
}
