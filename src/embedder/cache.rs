//! LRU cache in front of an embedder, used for repeated queries.

use std::num::NonZeroUsize;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;

use super::{Embedder, EmbeddingVector};
use crate::error::EmbeddingError;

/// Memoizes embeddings by exact input text.
pub struct CachedEmbedder<E> {
    inner: E,
    cache: Option<Mutex<LruCache<String, EmbeddingVector>>>,
}

impl<E: Embedder> CachedEmbedder<E> {
    /// Wraps `inner`; a capacity of zero disables caching.
    pub fn new(inner: E, capacity: usize) -> Self {
        let cache = NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap)));
        Self { inner, cache }
    }
}

#[async_trait]
impl<E: Embedder> Embedder for CachedEmbedder<E> {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbeddingError> {
        let Some(cache) = &self.cache else {
            return self.inner.embed(text).await;
        };

        if let Some(hit) = {
            let mut guard = cache.lock().await;
            guard.get(text).cloned()
        } {
            return Ok(hit);
        }

        // lock released while the inner call is in flight
        let vector = self.inner.embed(text).await?;
        cache.lock().await.put(text.to_string(), vector.clone());
        Ok(vector)
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}
