//! Embedding capability and its HTTP-backed implementations.

use async_trait::async_trait;

use crate::error::EmbeddingError;

pub mod cache;
pub mod openai;

pub use cache::CachedEmbedder;
pub use openai::OpenAiEmbedder;

/// Dense vector produced by an embedding model.
pub type EmbeddingVector = Vec<f32>;

/// Maps text to a fixed-length dense vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds a single string.
    async fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbeddingError>;

    /// Identifier of the model behind this embedder, for reporting.
    fn model(&self) -> &str;
}
