//! Vector storage capability, shared table helpers, and backends.
//!
//! Two backends implement [`VectorStore`]:
//! - [`PgVectorStore`] persists records in Postgres and searches through an
//!   IVF-flat index. Once that index is trained on a non-trivial collection,
//!   ranking is approximate: nearest neighbours can be missed.
//! - [`InMemoryVectorStore`] ranks by exhaustive scan and is exact.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;

use crate::chunker::Chunk;
use crate::error::StorageError;

pub mod memory;
pub mod postgres;

pub use self::memory::InMemoryVectorStore;
pub use self::postgres::{PgVectorStore, PgVectorStoreConfig};

/// Persists chunk vectors and answers nearest-neighbour queries.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Dimensionality every stored vector must have.
    fn dimensions(&self) -> usize;

    /// Appends one record. Re-inserting the same chunk produces a duplicate.
    async fn insert(&self, document: &str, chunk: &Chunk, vector: &[f32])
        -> Result<(), StorageError>;

    /// Returns up to `k` chunks, nearest first. An empty store yields an empty list.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<Chunk>, StorageError>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize, StorageError>;
}

/// Rejects vectors whose length differs from the collection's.
pub fn check_dimensions(expected: usize, vector: &[f32]) -> Result<(), StorageError> {
    if vector.len() != expected {
        return Err(StorageError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Distance used for ranking. Fixed per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    /// `1 - cosine similarity`.
    #[default]
    Cosine,
    /// L2 distance.
    Euclidean,
}

impl DistanceMetric {
    /// pgvector distance operator.
    pub fn operator(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "<=>",
            DistanceMetric::Euclidean => "<->",
        }
    }

    /// pgvector index operator class matching [`Self::operator`].
    pub fn operator_class(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "vector_cosine_ops",
            DistanceMetric::Euclidean => "vector_l2_ops",
        }
    }

    /// Distance between two equal-length vectors; smaller is nearer.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => {
                let mut dot = 0.0f32;
                let mut norm_a = 0.0f32;
                let mut norm_b = 0.0f32;
                for (x, y) in a.iter().zip(b) {
                    dot += x * y;
                    norm_a += x * x;
                    norm_b += y * y;
                }
                let denom = norm_a.sqrt() * norm_b.sqrt();
                if denom <= f32::EPSILON {
                    return 1.0;
                }
                1.0 - dot / denom
            }
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Cosine => f.write_str("cosine"),
            DistanceMetric::Euclidean => f.write_str("euclidean"),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            other => Err(format!("unknown distance metric '{other}'; use cosine or euclidean")),
        }
    }
}

/// Formats a vector as a pgvector literal with six decimals per component.
pub fn vector_literal(vector: &[f32]) -> String {
    let mut out = String::with_capacity(vector.len() * 10 + 2);
    out.push('[');
    for (i, value) in vector.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&format!("{:.6}", f64::from(*value)));
    }
    out.push(']');
    out
}

/// Fully-qualified Postgres table name (schema + table).
#[derive(Debug, Clone)]
pub struct TableName {
    schema: String,
    table: String,
}

impl TableName {
    /// Builds a new table identifier.
    pub fn new<S, T>(schema: S, table: T) -> Result<Self>
    where
        S: Into<String>,
        T: Into<String>,
    {
        let schema = schema.into();
        let table = table.into();
        anyhow::ensure!(!schema.trim().is_empty(), "schema name is required");
        anyhow::ensure!(!table.trim().is_empty(), "table name is required");
        Ok(Self { schema, table })
    }

    /// Fully-qualified table reference with quoted identifiers.
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }

    /// Name of the IVF index over the embedding column.
    pub fn ivfflat_index_name(&self) -> String {
        quote_ident(&format!(
            "{}_{}_embedding_ivfflat_idx",
            sanitize_ident(&self.schema),
            sanitize_ident(&self.table)
        ))
    }
}

/// Quotes Postgres identifiers, escaping embedded quotes.
pub fn quote_ident(input: &str) -> String {
    let escaped = input.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

fn sanitize_ident(input: &str) -> String {
    input
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect()
}
