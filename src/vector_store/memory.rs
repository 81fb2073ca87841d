//! Exact in-process store. Ranking is an exhaustive scan, so results are true k-NN.

use std::cmp::Ordering;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{check_dimensions, DistanceMetric, VectorStore};
use crate::chunker::Chunk;
use crate::error::StorageError;

struct StoredRecord {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Volatile store for tests and single-process runs.
pub struct InMemoryVectorStore {
    dimensions: usize,
    metric: DistanceMetric,
    records: RwLock<Vec<StoredRecord>>,
}

impl InMemoryVectorStore {
    /// Creates an empty store with a fixed dimensionality.
    pub fn new(dimensions: usize, metric: DistanceMetric) -> Self {
        Self {
            dimensions,
            metric,
            records: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn insert(&self, _document: &str, chunk: &Chunk, vector: &[f32]) -> Result<(), StorageError> {
        check_dimensions(self.dimensions, vector)?;
        self.records.write().await.push(StoredRecord {
            chunk: chunk.clone(),
            vector: vector.to_vec(),
        });
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<Chunk>, StorageError> {
        check_dimensions(self.dimensions, query)?;
        let records = self.records.read().await;
        let mut scored: Vec<(f32, &StoredRecord)> = records
            .iter()
            .map(|record| (self.metric.distance(query, &record.vector), record))
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, record)| record.chunk.clone())
            .collect())
    }

    async fn count(&self) -> Result<usize, StorageError> {
        Ok(self.records.read().await.len())
    }
}
