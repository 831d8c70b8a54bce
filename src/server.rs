//! HTTP boundary for uploads and prompts.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/uploads` | Multipart upload (`file` field); stages and ingests the document |
//! | `POST` | `/query` | JSON `{fileName, prompt}`; grounded answer over an ingested document |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Pipeline errors map to status codes here and nowhere else:
//! unsupported/malformed input → `400`, unknown document → `404`,
//! extraction/embedding/store failures → `500`. Server-side failures are
//! logged with full detail and answered with a user-safe message.
//!
//! # CORS
//!
//! All origins and methods are permitted; the original deployment served a
//! browser client from another origin.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::error::Error;
use crate::ingest::Pipeline;
use crate::query::PromptAnswer;
use crate::store::MatchedChunk;

/// Largest accepted upload, in bytes.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

/// Start the HTTP server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(pipeline: Arc<Pipeline>) -> anyhow::Result<()> {
    let bind_addr = pipeline.config().server.bind.clone();
    pipeline.staging().ensure_dir()?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/uploads", post(handle_upload))
        .route("/query", post(handle_query))
        .route("/health", get(handle_health))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(AppState { pipeline });

    info!(bind = %bind_addr, "server listening");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    status: u16,
    message: String,
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status: self.status.as_u16(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

/// Map a pipeline error to its response. Client mistakes echo the error
/// text; server-side failures are logged in full (including per-record
/// insert detail) and answered generically.
fn classify_error(err: Error) -> AppError {
    match &err {
        Error::UnsupportedFormat(_) | Error::MalformedInput(_) => {
            warn!(error = %err, "rejected request");
            AppError {
                status: StatusCode::BAD_REQUEST,
                message: err.to_string(),
            }
        }
        Error::NotFound(_) => AppError {
            status: StatusCode::NOT_FOUND,
            message: err.to_string(),
        },
        Error::Extract(_) | Error::Embedding(_) | Error::Store(_) | Error::Io(_) => {
            error!(error = %err, "pipeline failure");
            AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "There was an error while processing your document. Please try again later."
                    .to_string(),
            }
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /uploads ============

#[derive(Serialize)]
struct UploadResponse {
    message: String,
}

/// Accept a multipart upload, stage it, and run the full ingestion
/// pipeline. The response only reports success once every chunk is
/// persisted and the staged file is cleaned up.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut staged: Option<String> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(|n| n.to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| bad_request("Please provide a valid file"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;
        state
            .pipeline
            .staging()
            .write(&file_name, &bytes)
            .map_err(classify_error)?;
        staged = Some(file_name);
        break;
    }

    let file_name = staged.ok_or_else(|| bad_request("Please provide a valid file"))?;
    let report = state
        .pipeline
        .process_document(&file_name)
        .await
        .map_err(classify_error)?;

    Ok(Json(UploadResponse {
        message: format!(
            "{} ingested as {} with {} chunk(s)",
            file_name, report.collection, report.chunks
        ),
    }))
}

// ============ POST /query ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    file_name: String,
    prompt: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    status: u16,
    message: String,
    response: String,
    relevant_chunks: Vec<MatchedChunk>,
}

impl From<PromptAnswer> for QueryResponse {
    fn from(answer: PromptAnswer) -> Self {
        Self {
            status: 200,
            message: answer.message,
            response: answer.response,
            relevant_chunks: answer.relevant_chunks,
        }
    }
}

async fn handle_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    if request.file_name.trim().is_empty() || request.prompt.trim().is_empty() {
        return Err(bad_request("Please provide a valid input prompt"));
    }

    let answer = state
        .pipeline
        .prompt_document(&request.file_name, &request.prompt)
        .await
        .map_err(classify_error)?;

    Ok(Json(QueryResponse::from(answer)))
}
