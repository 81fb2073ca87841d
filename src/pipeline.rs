//! Ingest and answer orchestration over the embedder, store, and model capabilities.

use std::future::Future;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::chunker::{chunk_words, sanitize, Chunk};
use crate::config::PipelineConfig;
use crate::context::assemble;
use crate::embedder::Embedder;
use crate::error::PipelineError;
use crate::llm::{CompletionRequest, LanguageModel};
use crate::prompt::{build_prompt, ANSWER_TEMPERATURE, NO_CONTEXT_ANSWER};
use crate::vector_store::VectorStore;

/// Outcome of ingesting one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Document name the chunks were stored under.
    pub document: String,
    /// Chunks produced from the text.
    pub chunks_total: usize,
    /// Chunks embedded and stored successfully.
    pub chunks_saved: usize,
}

/// Answer plus the context it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    /// Model output, or the fixed no-context message.
    pub answer: String,
    /// Retrieved chunks, nearest first.
    pub context: Vec<Chunk>,
    /// Model the question was routed to.
    pub model: String,
}

/// Stage at which one chunk's ingest stopped.
enum ChunkFailure {
    Embed(PipelineError),
    Store(PipelineError),
}

impl ChunkFailure {
    fn error(&self) -> &PipelineError {
        match self {
            ChunkFailure::Embed(err) | ChunkFailure::Store(err) => err,
        }
    }
}

/// A lost connection and an insert that never returned both mean the store
/// could not be reached.
fn store_unreachable(err: &PipelineError) -> bool {
    match err {
        PipelineError::Storage(err) => err.is_unavailable(),
        PipelineError::Timeout { .. } => true,
        _ => false,
    }
}

/// Retrieval pipeline with its collaborators injected at construction.
#[derive(Clone)]
pub struct RetrievalPipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    model: Arc<dyn LanguageModel>,
    config: PipelineConfig,
}

impl RetrievalPipeline {
    /// Assembles a pipeline from its capabilities.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        model: Arc<dyn LanguageModel>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            model,
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Embedding model identifier.
    pub fn embed_model(&self) -> &str {
        self.embedder.model()
    }

    /// Vector dimensionality of the store.
    pub fn dimensions(&self) -> usize {
        self.store.dimensions()
    }

    /// Answering model handle, for pass-through operations such as listing models.
    pub fn language_model(&self) -> &Arc<dyn LanguageModel> {
        &self.model
    }

    /// Chunks `raw_text`, embeds each window, and stores it under `document`.
    ///
    /// Chunks that fail to embed or store are logged and skipped. The call
    /// only fails when no chunk could be produced, when every storage attempt
    /// found the store unreachable, or when `cancel` fires.
    pub async fn ingest(
        &self,
        document: &str,
        raw_text: &str,
        cancel: &CancellationToken,
    ) -> Result<IngestReport, PipelineError> {
        let text = sanitize(raw_text);
        let chunks: Vec<Chunk> = chunk_words(&text, self.config.chunking)
            .into_iter()
            .enumerate()
            .map(|(ordinal, window)| Chunk::new(document, ordinal, window))
            .collect();
        if chunks.is_empty() {
            return Err(PipelineError::InputRejected(
                "no extractable text in document".to_string(),
            ));
        }
        tracing::info!(document, chunks = chunks.len(), "ingesting document");

        let outcomes: Vec<Result<(), ChunkFailure>> = stream::iter(0..chunks.len())
            .map(|i| self.ingest_chunk(document, &chunks[i], cancel))
            .buffer_unordered(self.config.ingest_concurrency.max(1))
            .collect()
            .await;
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let mut saved = 0usize;
        let mut store_attempts = 0usize;
        let mut unreachable_count = 0usize;
        let mut first_unreachable: Option<PipelineError> = None;
        for outcome in outcomes {
            match outcome {
                Ok(()) => {
                    saved += 1;
                    store_attempts += 1;
                }
                Err(ChunkFailure::Store(err)) => {
                    store_attempts += 1;
                    if store_unreachable(&err) {
                        unreachable_count += 1;
                        first_unreachable.get_or_insert(err);
                    }
                }
                Err(ChunkFailure::Embed(_)) => {}
            }
        }
        if store_attempts > 0 && unreachable_count == store_attempts {
            if let Some(err) = first_unreachable {
                return Err(err);
            }
        }

        tracing::info!(
            document,
            chunks_total = chunks.len(),
            chunks_saved = saved,
            "ingest finished"
        );
        Ok(IngestReport {
            document: document.to_string(),
            chunks_total: chunks.len(),
            chunks_saved: saved,
        })
    }

    async fn ingest_chunk(
        &self,
        document: &str,
        chunk: &Chunk,
        cancel: &CancellationToken,
    ) -> Result<(), ChunkFailure> {
        let result = async {
            let vector = self
                .guarded("embedding", cancel, self.embedder.embed(&chunk.text))
                .await
                .map_err(ChunkFailure::Embed)?;
            self.guarded(
                "store insert",
                cancel,
                self.store.insert(document, chunk, &vector),
            )
            .await
            .map_err(ChunkFailure::Store)
        }
        .await;
        if let Err(failure) = &result {
            let err = failure.error();
            if !matches!(err, PipelineError::Cancelled) {
                tracing::warn!(document, chunk_id = %chunk.id, error = %err, "skipping chunk");
            }
        }
        result
    }

    /// Answers `query` from the `top_k` nearest chunks.
    ///
    /// An empty store short-circuits with a fixed message and no model call.
    pub async fn answer(
        &self,
        query: &str,
        top_k: Option<usize>,
        model: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Answer, PipelineError> {
        if query.trim().is_empty() {
            return Err(PipelineError::InputRejected(
                "query must not be empty".to_string(),
            ));
        }
        let model = self.config.resolve_model(model);
        let k = self.config.clamp_top_k(top_k);

        let query_vector = self
            .guarded("query embedding", cancel, self.embedder.embed(query))
            .await?;
        let context = self
            .guarded("store search", cancel, self.store.search(&query_vector, k))
            .await?;
        tracing::debug!(k, hits = context.len(), "retrieved context");
        if context.is_empty() {
            return Ok(Answer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                context,
                model,
            });
        }

        let assembled = assemble(&context, self.config.max_context_chars);
        let request = CompletionRequest {
            model,
            prompt: build_prompt(query, &assembled),
            temperature: ANSWER_TEMPERATURE,
            max_tokens: self.config.max_answer_tokens,
        };
        let answer = self
            .guarded("completion", cancel, self.model.complete(&request))
            .await?;
        Ok(Answer {
            answer,
            context,
            model: request.model,
        })
    }

    /// Runs one external call under the per-call deadline and the request's
    /// cancellation token.
    async fn guarded<T, E, F>(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, E>>,
        PipelineError: From<E>,
    {
        let deadline = self.config.call_timeout;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            outcome = tokio::time::timeout(deadline, call) => match outcome {
                Ok(result) => result.map_err(PipelineError::from),
                Err(_) => Err(PipelineError::Timeout { operation, after: deadline }),
            },
        }
    }
}
