//! Answering-model capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// OpenAI-compatible chat backend.
pub mod openai;

pub use openai::OpenAiChatModel;

/// Request envelope shared by answering models.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model identifier, passed through unvalidated.
    pub model: String,
    /// Full prompt sent as a single user message.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Optional completion length cap.
    pub max_tokens: Option<usize>,
}

/// Model advertised by the inference endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier.
    pub id: String,
    /// Owner reported by the endpoint, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,
}

/// Chat-completion backend used to answer from retrieved context.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Produces an answer for `request`.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    /// Lists models the endpoint currently serves.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError>;
}
