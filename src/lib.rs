#![warn(missing_docs)]
//! Retrieval-augmented question answering over a private document corpus.
//!
//! Documents are cut into overlapping word windows, embedded, and stored in
//! pgvector. Questions are embedded the same way, the nearest windows are
//! packed into a bounded context, and a chat model answers from that context.

pub mod api;
pub mod chunker;
pub mod config;
pub mod context;
pub mod embedder;
pub mod error;
pub mod extract;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod prompt;
pub mod vector_store;

#[cfg(test)]
mod test_support;

pub use chunker::{Chunk, ChunkingConfig};
pub use config::{PipelineConfig, Settings};
pub use embedder::{CachedEmbedder, Embedder, OpenAiEmbedder};
pub use error::{EmbeddingError, LlmError, PipelineError, StorageError};
pub use llm::{LanguageModel, OpenAiChatModel};
pub use pipeline::{Answer, IngestReport, RetrievalPipeline};
pub use vector_store::{
    DistanceMetric, InMemoryVectorStore, PgVectorStore, PgVectorStoreConfig, TableName,
    VectorStore,
};
