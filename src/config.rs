//! Runtime configuration: pipeline knobs and the shared command-line surface.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use crate::chunker::ChunkingConfig;
use crate::embedder::{CachedEmbedder, OpenAiEmbedder};
use crate::llm::OpenAiChatModel;
use crate::pipeline::RetrievalPipeline;
use crate::vector_store::{DistanceMetric, PgVectorStoreConfig, TableName, VectorStore};

/// Hard ceiling on chunks requested from the store per query.
pub const TOP_K_CEILING: usize = 20;

/// Tunable knobs consumed by [`RetrievalPipeline`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Word-window chunking parameters.
    pub chunking: ChunkingConfig,
    /// Character budget for the assembled context.
    pub max_context_chars: usize,
    /// k used when the caller does not ask for one.
    pub default_top_k: usize,
    /// Upper bound applied to caller-supplied k.
    pub max_top_k: usize,
    /// Chat model used when the request names none.
    pub default_chat_model: String,
    /// Optional completion length cap.
    pub max_answer_tokens: Option<usize>,
    /// Deadline applied to every embedder, store, and model call.
    pub call_timeout: Duration,
    /// Chunks embedded and inserted concurrently during one ingest.
    pub ingest_concurrency: usize,
}

impl PipelineConfig {
    /// Checks cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.chunking.window_words > 0, "chunk window must be positive");
        anyhow::ensure!(self.max_context_chars > 0, "max context size must be positive");
        anyhow::ensure!(self.default_top_k >= 1, "default top-k must be at least 1");
        anyhow::ensure!(
            self.max_top_k >= self.default_top_k && self.max_top_k <= TOP_K_CEILING,
            "max top-k must lie in [{}, {}]",
            self.default_top_k,
            TOP_K_CEILING
        );
        anyhow::ensure!(!self.call_timeout.is_zero(), "call timeout must be positive");
        Ok(())
    }

    /// Resolves the k sent to the store: absent or zero falls back to the
    /// default, anything else is capped at `max_top_k`.
    pub fn clamp_top_k(&self, requested: Option<usize>) -> usize {
        let ceiling = self.max_top_k.clamp(1, TOP_K_CEILING);
        requested
            .filter(|k| *k > 0)
            .unwrap_or(self.default_top_k)
            .clamp(1, ceiling)
    }

    /// Model for a request: the trimmed requested name, or the default.
    pub fn resolve_model(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.default_chat_model)
            .to_string()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            max_context_chars: 12_000,
            default_top_k: 5,
            max_top_k: TOP_K_CEILING,
            default_chat_model: "google/gemma-3n-e4b".to_string(),
            max_answer_tokens: None,
            call_timeout: Duration::from_secs(30),
            ingest_concurrency: 1,
        }
    }
}

/// Settings shared by every binary, flattened into each CLI.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Postgres connection string
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "host=localhost port=5432 user=postgres dbname=pdf_ai sslmode=disable"
    )]
    pub database_url: String,

    /// Schema holding the chunk table
    #[arg(long, env = "DOCRAG_SCHEMA", default_value = "public")]
    pub schema: String,

    /// Chunk table name
    #[arg(long, env = "DOCRAG_TABLE", default_value = "chunks")]
    pub table: String,

    /// Ranking metric (cosine or euclidean); must not change once data is stored
    #[arg(long, env = "DOCRAG_METRIC", default_value = "cosine")]
    pub metric: DistanceMetric,

    /// IVF list count used when creating the vector index
    #[arg(long, env = "DOCRAG_IVFFLAT_LISTS", default_value_t = 100)]
    pub ivfflat_lists: usize,

    /// ivfflat.probes for search sessions (unset = server default)
    #[arg(long, env = "DOCRAG_IVFFLAT_PROBES")]
    pub ivfflat_probes: Option<usize>,

    /// Base URL of the OpenAI-compatible inference server
    #[arg(long, env = "DOCRAG_LLM_BASE_URL", default_value = "http://localhost:1234/v1")]
    pub llm_base_url: String,

    /// Bearer key for the inference server (local servers usually need none)
    #[arg(long, env = "DOCRAG_API_KEY")]
    pub api_key: Option<String>,

    /// Embedding model identifier
    #[arg(
        long,
        env = "DOCRAG_EMBED_MODEL",
        default_value = "text-embedding-nomic-embed-text-v1.5"
    )]
    pub embed_model: String,

    /// Embedding dimensionality fixed in the table schema
    #[arg(long, env = "DOCRAG_EMBED_DIMENSIONS", default_value_t = 768)]
    pub embed_dimensions: usize,

    /// Attempts per embedding request (1 disables retries)
    #[arg(long, env = "DOCRAG_EMBED_MAX_ATTEMPTS", default_value_t = 1)]
    pub embed_max_attempts: usize,

    /// Cached query embeddings (0 disables caching)
    #[arg(long, env = "DOCRAG_EMBED_CACHE", default_value_t = 256)]
    pub embedding_cache_size: usize,

    /// Default chat model used to answer questions
    #[arg(long, env = "DOCRAG_CHAT_MODEL", default_value = "google/gemma-3n-e4b")]
    pub chat_model: String,

    /// Optional cap on answer length in tokens
    #[arg(long, env = "DOCRAG_MAX_ANSWER_TOKENS")]
    pub max_answer_tokens: Option<usize>,

    /// Words per chunk window
    #[arg(long, env = "DOCRAG_CHUNK_WORDS", default_value_t = 220)]
    pub chunk_words: usize,

    /// Words shared by consecutive windows
    #[arg(long, env = "DOCRAG_CHUNK_OVERLAP", default_value_t = 40)]
    pub chunk_overlap: usize,

    /// Character budget for the context handed to the model
    #[arg(long, env = "DOCRAG_MAX_CONTEXT_CHARS", default_value_t = 12_000)]
    pub max_context_chars: usize,

    /// Chunks retrieved when the request does not say
    #[arg(long, env = "DOCRAG_DEFAULT_TOP_K", default_value_t = 5)]
    pub default_top_k: usize,

    /// Upper bound on chunks retrieved per request (at most 20)
    #[arg(long, env = "DOCRAG_MAX_TOP_K", default_value_t = 20)]
    pub max_top_k: usize,

    /// Seconds allowed for each embedding, storage, or model call
    #[arg(long, env = "DOCRAG_CALL_TIMEOUT_SECS", default_value_t = 30)]
    pub call_timeout_secs: u64,

    /// Chunks processed concurrently within one ingest
    #[arg(long, env = "DOCRAG_INGEST_CONCURRENCY", default_value_t = 1)]
    pub ingest_concurrency: usize,
}

impl Settings {
    /// Converts the parsed settings into a validated [`PipelineConfig`].
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let config = PipelineConfig {
            chunking: ChunkingConfig {
                window_words: self.chunk_words,
                overlap_words: self.chunk_overlap,
            },
            max_context_chars: self.max_context_chars,
            default_top_k: self.default_top_k,
            max_top_k: self.max_top_k,
            default_chat_model: self.chat_model.clone(),
            max_answer_tokens: self.max_answer_tokens,
            call_timeout: self.call_timeout(),
            ingest_concurrency: self.ingest_concurrency.max(1),
        };
        config.validate()?;
        Ok(config)
    }

    /// Per-call deadline.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.max(1))
    }

    /// pgvector connection settings.
    pub fn store_config(&self) -> Result<PgVectorStoreConfig> {
        Ok(PgVectorStoreConfig {
            database_url: self.database_url.clone(),
            table: TableName::new(self.schema.clone(), self.table.clone())?,
            dimensions: self.embed_dimensions,
            metric: self.metric,
            ivfflat_lists: self.ivfflat_lists,
            ivfflat_probes: self.ivfflat_probes,
        })
    }

    /// Embedding client for the configured server.
    pub fn embedder(&self) -> Result<OpenAiEmbedder> {
        OpenAiEmbedder::new(
            self.api_key.clone(),
            &self.llm_base_url,
            self.embed_model.clone(),
            None,
            self.call_timeout(),
            self.embed_max_attempts,
        )
    }

    /// Chat client for the configured server.
    pub fn chat_model(&self) -> Result<OpenAiChatModel> {
        OpenAiChatModel::new(self.api_key.clone(), &self.llm_base_url, self.call_timeout())
    }

    /// Wires the HTTP-backed embedder and chat model around `store`.
    pub fn build_pipeline(&self, store: Arc<dyn VectorStore>) -> Result<RetrievalPipeline> {
        let embedder = CachedEmbedder::new(self.embedder()?, self.embedding_cache_size);
        Ok(RetrievalPipeline::new(
            Arc::new(embedder),
            store,
            Arc::new(self.chat_model()?),
            self.pipeline_config()?,
        ))
    }
}
