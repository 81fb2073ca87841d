mod common;

use std::sync::Arc;

use common::{EchoModel, VocabularyEmbedder};
use docrag::prompt::NO_CONTEXT_ANSWER;
use docrag::{
    ChunkingConfig, DistanceMetric, InMemoryVectorStore, PipelineConfig, RetrievalPipeline,
    VectorStore,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

const VOCABULARY: [&str; 8] = [
    "rust", "borrow", "checker", "lifetime", "postgres", "index", "vector", "vacuum",
];

struct Harness {
    pipeline: RetrievalPipeline,
    store: Arc<InMemoryVectorStore>,
    model: Arc<EchoModel>,
}

fn harness(metric: DistanceMetric, config: PipelineConfig) -> Harness {
    let embedder = VocabularyEmbedder::new(VOCABULARY.to_vec());
    let store = Arc::new(InMemoryVectorStore::new(embedder.dimensions(), metric));
    let model = Arc::new(EchoModel::default());
    let pipeline = RetrievalPipeline::new(Arc::new(embedder), store.clone(), model.clone(), config);
    Harness {
        pipeline,
        store,
        model,
    }
}

fn small_windows() -> PipelineConfig {
    PipelineConfig {
        chunking: ChunkingConfig {
            window_words: 4,
            overlap_words: 1,
        },
        ..PipelineConfig::default()
    }
}

#[tokio::test]
async fn answers_from_the_matching_document() {
    let h = harness(DistanceMetric::Cosine, small_windows());
    let cancel = CancellationToken::new();
    let rust = h
        .pipeline
        .ingest("rust.txt", "the borrow checker enforces every lifetime rule", &cancel)
        .await
        .unwrap();
    let pg = h
        .pipeline
        .ingest("pg.txt", "postgres keeps a vector index and needs vacuum", &cancel)
        .await
        .unwrap();
    assert_eq!(rust.chunks_saved, rust.chunks_total);
    assert_eq!(pg.chunks_saved, pg.chunks_total);
    assert_eq!(
        h.store.count().await.unwrap(),
        rust.chunks_total + pg.chunks_total
    );

    let answer = h
        .pipeline
        .answer("How does postgres vacuum work?", Some(2), None, &cancel)
        .await
        .unwrap();
    assert!(!answer.context.is_empty());
    assert!(answer.context.len() <= 2);
    assert!(answer.context[0].id.starts_with("pg.txt_chunk_"));
    assert_eq!(answer.model, PipelineConfig::default().default_chat_model);

    let prompts = h.model.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(&format!("[{}]", answer.context[0].id)));
    assert!(prompts[0].contains("Question: How does postgres vacuum work?"));
}

#[tokio::test]
async fn fresh_store_answers_without_the_model() {
    let h = harness(DistanceMetric::Cosine, PipelineConfig::default());
    let answer = h
        .pipeline
        .answer("rust lifetime", None, None, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(answer.answer, NO_CONTEXT_ANSWER);
    assert!(answer.context.is_empty());
    assert!(h.model.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn stored_chunk_is_its_own_nearest_neighbour() {
    let h = harness(DistanceMetric::Euclidean, PipelineConfig::default());
    let cancel = CancellationToken::new();
    for (doc, text) in [
        ("a", "rust borrow"),
        ("b", "postgres index"),
        ("c", "vector vacuum lifetime"),
    ] {
        h.pipeline.ingest(doc, text, &cancel).await.unwrap();
    }
    let answer = h
        .pipeline
        .answer("postgres index", Some(1), None, &cancel)
        .await
        .unwrap();
    assert_eq!(answer.context.len(), 1);
    assert_eq!(answer.context[0].id, "b_chunk_0");
    assert_eq!(answer.context[0].text, "postgres index");
}

#[tokio::test]
async fn context_respects_the_character_budget() {
    let config = PipelineConfig {
        max_context_chars: 60,
        ..small_windows()
    };
    let h = harness(DistanceMetric::Cosine, config);
    let cancel = CancellationToken::new();
    h.pipeline
        .ingest(
            "long.txt",
            "rust borrow checker lifetime rust borrow checker lifetime rust borrow",
            &cancel,
        )
        .await
        .unwrap();
    let answer = h
        .pipeline
        .answer("rust borrow", Some(20), None, &cancel)
        .await
        .unwrap();
    assert!(answer.context.len() > 1);

    let prompts = h.model.prompts.lock().unwrap();
    let blocks = prompts[0].matches("[long.txt_chunk_").count();
    assert!(blocks >= 1);
    assert!(blocks < answer.context.len());
}

#[tokio::test]
async fn reingesting_duplicates_records() {
    let h = harness(DistanceMetric::Cosine, PipelineConfig::default());
    let cancel = CancellationToken::new();
    h.pipeline.ingest("dup", "rust vector", &cancel).await.unwrap();
    h.pipeline.ingest("dup", "rust vector", &cancel).await.unwrap();
    assert_eq!(h.store.count().await.unwrap(), 2);
}
