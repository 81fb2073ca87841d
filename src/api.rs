//! HTTP surface over the [`RetrievalPipeline`].

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::extract::{extract_raw_text, save_upload};
use crate::llm::ModelInfo;
use crate::pipeline::{IngestReport, RetrievalPipeline};

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<RetrievalPipeline>,
    upload_dir: Arc<PathBuf>,
}

impl AppState {
    /// Uploaded files are kept under `upload_dir`.
    pub fn new(pipeline: Arc<RetrievalPipeline>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            pipeline,
            upload_dir: Arc::new(upload_dir.into()),
        }
    }
}

/// Builds the router with every endpoint mounted.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/models", get(list_models))
        .route("/ingest", post(ingest_upload))
        .route("/ingest/text", post(ingest_text))
        .route("/ask", post(ask))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct IngestTextRequest {
    document: String,
    text: String,
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    status: String,
    doc: String,
    chunks_total: usize,
    chunks_saved: usize,
    embed_model: String,
    vector_dim: usize,
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    query: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default, rename = "topK", alias = "top_k")]
    top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
struct AskResponse {
    answer: String,
    context: Vec<ContextChunk>,
    model: String,
}

#[derive(Debug, Serialize)]
struct ContextChunk {
    id: String,
    text: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Error rendered as `{"error": ...}` with a matching status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = match &err {
            PipelineError::InputRejected(_) => StatusCode::BAD_REQUEST,
            PipelineError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

/// Token cancelled when the returned guard drops, i.e. when the handler
/// finishes or its future is abandoned by a disconnecting client.
fn request_token() -> (CancellationToken, tokio_util::sync::DropGuard) {
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    (token, guard)
}

async fn health() -> &'static str {
    "ok"
}

async fn list_models(State(state): State<AppState>) -> Result<Json<Vec<ModelInfo>>, ApiError> {
    let models = state
        .pipeline
        .language_model()
        .list_models()
        .await
        .map_err(|err| ApiError::from(PipelineError::from(err)))?;
    Ok(Json(models))
}

async fn ingest_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("invalid multipart body: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload.pdf").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::bad_request(format!("failed to read upload: {err}")))?;
        upload = Some((name, bytes));
        break;
    }
    let Some((name, bytes)) = upload else {
        return Err(ApiError::bad_request("file is required (form field: file)"));
    };

    let path = save_upload(&state.upload_dir, &name, &bytes)
        .await
        .map_err(|err| {
            tracing::error!(error = %format!("{err:#}"), "failed to save upload");
            ApiError::internal("failed to save file")
        })?;
    let text = extract_raw_text(&path).await.map_err(|err| {
        tracing::error!(path = %path.display(), error = %format!("{err:#}"), "extraction failed");
        ApiError::internal("failed to extract text from document")
    })?;
    let document = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or(name);

    let (cancel, _guard) = request_token();
    let report = state.pipeline.ingest(&document, &text, &cancel).await?;
    Ok(Json(ingest_response(&state, report)))
}

async fn ingest_text(
    State(state): State<AppState>,
    Json(request): Json<IngestTextRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let document = request.document.trim();
    if document.is_empty() {
        return Err(ApiError::bad_request("document name must not be empty"));
    }
    let (cancel, _guard) = request_token();
    let report = state.pipeline.ingest(document, &request.text, &cancel).await?;
    Ok(Json(ingest_response(&state, report)))
}

fn ingest_response(state: &AppState, report: IngestReport) -> IngestResponse {
    IngestResponse {
        status: "ok".to_string(),
        doc: report.document,
        chunks_total: report.chunks_total,
        chunks_saved: report.chunks_saved,
        embed_model: state.pipeline.embed_model().to_string(),
        vector_dim: state.pipeline.dimensions(),
    }
}

async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let (cancel, _guard) = request_token();
    let answer = state
        .pipeline
        .answer(
            &request.query,
            request.top_k,
            request.model.as_deref(),
            &cancel,
        )
        .await?;
    Ok(Json(AskResponse {
        answer: answer.answer,
        context: answer
            .context
            .into_iter()
            .map(|chunk| ContextChunk {
                id: chunk.id,
                text: chunk.text,
            })
            .collect(),
        model: answer.model,
    }))
}
