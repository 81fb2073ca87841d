//! OpenAI-compatible embeddings client (OpenAI, LM Studio, vLLM, ...).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{Embedder, EmbeddingVector};
use crate::error::EmbeddingError;

/// Async embeddings client that talks to `<base>/embeddings`.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
    max_attempts: usize,
}

impl OpenAiEmbedder {
    /// Builds a new embeddings client.
    ///
    /// `api_key` may be empty for local servers that do not authenticate.
    /// `max_attempts` of 1 disables retries.
    pub fn new(
        api_key: Option<String>,
        base_url: &str,
        model: String,
        dimensions: Option<usize>,
        timeout: Duration,
        max_attempts: usize,
    ) -> Result<Self> {
        anyhow::ensure!(!model.trim().is_empty(), "missing embedding model name");
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(key) = api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            let auth = format!("Bearer {key}");
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth).context("invalid embedding API key")?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build embeddings HTTP client")?;
        let endpoint = format!("{}/embeddings", base_url.trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            model,
            dimensions,
            max_attempts: max_attempts.max(1),
        })
    }

    /// Sends a batch of strings and returns vectors in input order.
    pub async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let mut attempt = 0usize;
        loop {
            let request = EmbeddingRequest {
                model: &self.model,
                input: inputs,
                dimensions: self.dimensions,
            };
            match self.client.post(&self.endpoint).json(&request).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let parsed: EmbeddingResponse = resp.json().await?;
                        return parsed.into_vectors(inputs.len());
                    }

                    let body = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_attempts {
                        attempt += 1;
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(EmbeddingError::Status {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(err) => {
                    if is_retryable_error(&err) && attempt + 1 < self.max_attempts {
                        attempt += 1;
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding returned".to_string()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body() || err.is_request()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(500 * (1 << capped))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

impl EmbeddingResponse {
    fn into_vectors(mut self, expected: usize) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        if self.data.len() != expected {
            return Err(EmbeddingError::InvalidResponse(format!(
                "endpoint returned {} embeddings for {} inputs",
                self.data.len(),
                expected
            )));
        }
        self.data.sort_by_key(|entry| entry.index);
        Ok(self.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_is_reordered_by_index() {
        let raw = r#"{"data":[{"embedding":[2.0],"index":1},{"embedding":[1.0],"index":0}]}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        let vectors = parsed.into_vectors(2).unwrap();
        assert_eq!(vectors, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn response_count_mismatch_is_rejected() {
        let raw = r#"{"data":[]}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            parsed.into_vectors(1),
            Err(EmbeddingError::InvalidResponse(_))
        ));
    }

    #[test]
    fn request_omits_absent_dimensions() {
        let inputs = ["hello"];
        let body = serde_json::to_value(EmbeddingRequest {
            model: "nomic",
            input: &inputs,
            dimensions: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"model": "nomic", "input": ["hello"]}));
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(retry_backoff(1), Duration::from_millis(1000));
        assert_eq!(retry_backoff(9), retry_backoff(5));
    }

    #[test]
    fn blank_model_is_rejected() {
        let result = OpenAiEmbedder::new(
            None,
            "http://localhost:1234/v1",
            " ".to_string(),
            None,
            Duration::from_secs(1),
            1,
        );
        assert!(result.is_err());
    }
}
