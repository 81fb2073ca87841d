//! Error taxonomy shared by the retrieval pipeline and its capabilities.

use std::time::Duration;

use thiserror::Error;

/// Failure reported by an [`Embedder`](crate::embedder::Embedder).
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The embedding endpoint could not be reached or the request failed in transit.
    #[error("embedding transport error: {0}")]
    Transport(String),
    /// The endpoint answered with a non-success status.
    #[error("embedding endpoint returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, if readable.
        body: String,
    },
    /// The endpoint answered but the payload was unusable.
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EmbeddingError::InvalidResponse(err.to_string())
        } else {
            EmbeddingError::Transport(err.to_string())
        }
    }
}

/// Failure reported by a [`VectorStore`](crate::vector_store::VectorStore).
#[derive(Debug, Error)]
pub enum StorageError {
    /// The vector length disagrees with the collection's fixed dimensionality.
    #[error("vector has {actual} dimensions, collection expects {expected}")]
    DimensionMismatch {
        /// Dimensionality fixed at store creation.
        expected: usize,
        /// Length of the offending vector.
        actual: usize,
    },
    /// Connection to the backing database is lost or was never established.
    #[error("vector store unavailable: {0}")]
    Unavailable(String),
    /// The backend rejected the statement (constraint, syntax, type errors).
    #[error("vector store query failed: {0}")]
    Query(String),
}

impl StorageError {
    /// True when the failure means the store could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

impl From<tokio_postgres::Error> for StorageError {
    fn from(err: tokio_postgres::Error) -> Self {
        if err.code().is_some() {
            StorageError::Query(err.to_string())
        } else {
            StorageError::Unavailable(err.to_string())
        }
    }
}

/// Failure reported by a [`LanguageModel`](crate::llm::LanguageModel).
#[derive(Debug, Error)]
pub enum LlmError {
    /// Request could not be delivered.
    #[error("language model transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The endpoint answered with a non-success status.
    #[error("language model returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, if readable.
        body: String,
    },
    /// The completion carried no choices.
    #[error("language model returned an empty answer")]
    EmptyAnswer,
}

/// Errors surfaced by [`RetrievalPipeline`](crate::pipeline::RetrievalPipeline) operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Caller input was unusable; nothing was attempted.
    #[error("{0}")]
    InputRejected(String),
    /// Embedding the query failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    /// The store failed while searching, or was unreachable for every chunk on ingest.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The answering model failed.
    #[error(transparent)]
    LanguageModel(#[from] LlmError),
    /// An external call exceeded its deadline.
    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout {
        /// Name of the guarded call.
        operation: &'static str,
        /// Configured deadline.
        after: Duration,
    },
    /// The request was cancelled before completion.
    #[error("request cancelled")]
    Cancelled,
}

impl PipelineError {
    /// True for errors caused by the caller rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::InputRejected(_))
    }
}
