use std::sync::Mutex;

use async_trait::async_trait;
use docrag::llm::{CompletionRequest, ModelInfo};
use docrag::{Embedder, EmbeddingError, LanguageModel, LlmError};

/// One dimension per vocabulary word; unknown words are ignored.
pub struct VocabularyEmbedder {
    vocabulary: Vec<&'static str>,
}

impl VocabularyEmbedder {
    pub fn new(vocabulary: Vec<&'static str>) -> Self {
        Self { vocabulary }
    }

    pub fn dimensions(&self) -> usize {
        self.vocabulary.len()
    }
}

#[async_trait]
impl Embedder for VocabularyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0; self.vocabulary.len()];
        for word in text.split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if let Some(idx) = self.vocabulary.iter().position(|v| *v == word) {
                vector[idx] += 1.0;
            }
        }
        Ok(vector)
    }

    fn model(&self) -> &str {
        "vocabulary"
    }
}

/// Echoes the prompt length so tests can tell the model was consulted.
#[derive(Default)]
pub struct EchoModel {
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl LanguageModel for EchoModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        Ok(format!("answered with {} prompt chars", request.prompt.chars().count()))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        Ok(Vec::new())
    }
}
