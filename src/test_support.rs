//! In-process fakes for the embedder, store, and model capabilities.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::chunker::Chunk;
use crate::embedder::{Embedder, EmbeddingVector};
use crate::error::{EmbeddingError, LlmError, StorageError};
use crate::llm::{CompletionRequest, LanguageModel, ModelInfo};
use crate::vector_store::{check_dimensions, VectorStore};

/// Hashed bag-of-words embedder; texts sharing words land close together.
pub(crate) struct FakeEmbedder {
    dims: usize,
    fail_on: Option<String>,
    wrong_dims_on: Option<String>,
    calls: AtomicUsize,
}

impl FakeEmbedder {
    pub(crate) fn new(dims: usize) -> Self {
        Self {
            dims,
            fail_on: None,
            wrong_dims_on: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails any text containing `needle`.
    pub(crate) fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    /// Returns a vector one element too long for texts containing `needle`.
    pub(crate) fn wrong_dimensions_on(mut self, needle: &str) -> Self {
        self.wrong_dims_on = Some(needle.to_string());
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn fnv1a(token: &str) -> u64 {
    token.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.as_deref().is_some_and(|needle| text.contains(needle)) {
            return Err(EmbeddingError::Status {
                status: 500,
                body: "scripted failure".to_string(),
            });
        }
        let mut dims = self.dims;
        if self
            .wrong_dims_on
            .as_deref()
            .is_some_and(|needle| text.contains(needle))
        {
            dims += 1;
        }
        let mut vector = vec![0.0f32; dims];
        for token in text.split_whitespace() {
            vector[(fnv1a(token) % self.dims as u64) as usize] += 1.0;
        }
        Ok(vector)
    }

    fn model(&self) -> &str {
        "fake-embedder"
    }
}

/// Records every completion request and answers with a fixed string.
#[derive(Default)]
pub(crate) struct RecordingModel {
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
}

impl RecordingModel {
    /// Sleeps for `delay` before answering.
    pub(crate) fn delayed(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for RecordingModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok("scripted answer".to_string())
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        Ok(vec![ModelInfo {
            id: "scripted".to_string(),
            owned_by: None,
        }])
    }
}

#[derive(Clone, Copy)]
enum Script {
    Unreachable,
    Rejecting,
    Recording,
    Hanging,
    Flaky,
}

/// Store whose every call follows a fixed script.
pub(crate) struct ScriptedStore {
    dims: usize,
    script: Script,
    requested_k: Mutex<Vec<usize>>,
    inserts: AtomicUsize,
    saved: AtomicUsize,
}

impl ScriptedStore {
    fn with(dims: usize, script: Script) -> Self {
        Self {
            dims,
            script,
            requested_k: Mutex::new(Vec::new()),
            inserts: AtomicUsize::new(0),
            saved: AtomicUsize::new(0),
        }
    }

    /// Every call reports a lost connection.
    pub(crate) fn unreachable(dims: usize) -> Self {
        Self::with(dims, Script::Unreachable)
    }

    /// Inserts are refused by the backend; searches return nothing.
    pub(crate) fn rejecting(dims: usize) -> Self {
        Self::with(dims, Script::Rejecting)
    }

    /// Remembers the k of every search and returns nothing.
    pub(crate) fn recording(dims: usize) -> Self {
        Self::with(dims, Script::Recording)
    }

    /// Inserts never return.
    pub(crate) fn hanging(dims: usize) -> Self {
        Self::with(dims, Script::Hanging)
    }

    /// Every second insert reports a lost connection; the others are kept.
    pub(crate) fn flaky(dims: usize) -> Self {
        Self::with(dims, Script::Flaky)
    }

    pub(crate) fn requested_k(&self) -> Vec<usize> {
        self.requested_k.lock().map(|k| k.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl VectorStore for ScriptedStore {
    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn insert(&self, _document: &str, _chunk: &Chunk, vector: &[f32]) -> Result<(), StorageError> {
        match self.script {
            Script::Unreachable => Err(StorageError::Unavailable("connection refused".to_string())),
            Script::Rejecting => Err(StorageError::Query("constraint violated".to_string())),
            Script::Recording => check_dimensions(self.dims, vector),
            Script::Hanging => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
            Script::Flaky => {
                if self.inserts.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
                    return Err(StorageError::Unavailable("connection reset".to_string()));
                }
                check_dimensions(self.dims, vector)?;
                self.saved.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    async fn search(&self, _query: &[f32], k: usize) -> Result<Vec<Chunk>, StorageError> {
        if let Ok(mut requested) = self.requested_k.lock() {
            requested.push(k);
        }
        match self.script {
            Script::Unreachable => Err(StorageError::Unavailable("connection refused".to_string())),
            Script::Rejecting | Script::Recording | Script::Hanging | Script::Flaky => Ok(Vec::new()),
        }
    }

    async fn count(&self) -> Result<usize, StorageError> {
        match self.script {
            Script::Unreachable => Err(StorageError::Unavailable("connection refused".to_string())),
            Script::Flaky => Ok(self.saved.load(Ordering::SeqCst)),
            Script::Rejecting | Script::Recording | Script::Hanging => Ok(0),
        }
    }
}
