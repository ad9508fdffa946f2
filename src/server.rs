//! JSON HTTP API over the chat pipeline.
//!
//! # Endpoints
//!
//! | Method   | Path | Description |
//! |----------|------|-------------|
//! | `GET`    | `/health` | Health check (version + index readiness) |
//! | `POST`   | `/chat` | Ask a question within a session |
//! | `POST`   | `/documents` | Upload and ingest a PDF (multipart) |
//! | `GET`    | `/sessions/{id}/history` | Session transcript |
//! | `DELETE` | `/sessions/{id}/history` | Clear a session transcript |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `upstream_error`
//! (502, a hosted provider or the vector index failed), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front ends can
//! talk to the server directly.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::history::HistoryStore;
use crate::index::VectorIndex;
use crate::ingest::Ingestor;
use crate::models::{IngestReport, Message};
use crate::pipeline::{assemble, ChatPipeline};

/// Largest accepted document upload, in bytes.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state passed to all route handlers via Axum's `State`
/// extractor.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<ChatPipeline>,
    ingestor: Arc<Ingestor>,
    history: Arc<HistoryStore>,
    index: Arc<dyn VectorIndex>,
}

/// Starts the HTTP server.
///
/// Assembles the full pipeline from configuration, prepares the index
/// schema, binds to `[server].bind`, and serves until ctrl-c. The index is
/// closed after the listener stops.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let components = assemble(config)?;
    tracing::info!(
        embedding = components.embedder.model_name(),
        generation = components.generator.model_name(),
        "pipeline assembled"
    );
    components.index.prepare().await?;

    let ingestor = Arc::new(Ingestor::new(
        components.embedder.clone(),
        components.index.clone(),
        config,
    ));

    let state = AppState {
        pipeline: components.pipeline.clone(),
        ingestor,
        history: components.history.clone(),
        index: components.index.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/chat", post(handle_chat))
        .route("/documents", post(handle_upload))
        .route(
            "/sessions/{id}/history",
            get(handle_history).delete(handle_clear_history),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state);

    tracing::info!("listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    components.index.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install ctrl-c handler: {}", err);
    }
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Constructs a 404 Not Found error.
fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

/// Constructs a 502 error for embedding, index, and generation failures.
fn upstream_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "upstream_error".to_string(),
        message: message.into(),
    }
}

/// Constructs a 500 error for everything else.
fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Maps pipeline and ingestion errors to the most appropriate HTTP status.
/// The full context chain is inspected so an error wrapped at an I/O or HTTP
/// boundary still classifies by its root cause.
fn classify_error(err: anyhow::Error) -> AppError {
    let msg = format!("{:#}", err);

    if msg.contains("not found") {
        not_found(msg)
    } else if msg.contains("must not be empty")
        || msg.contains("is not a PDF")
        || msg.contains("failed to parse PDF")
        || msg.contains("Invalid document path")
    {
        bad_request(msg)
    } else if msg.contains("API error")
        || msg.contains("request failed")
        || msg.contains("Weaviate")
        || msg.contains("Invalid embedding response")
        || msg.contains("Invalid OpenAI response")
        || msg.contains("Invalid generation response")
    {
        upstream_error(msg)
    } else {
        internal_error(msg)
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
    /// Whether the vector index answered its readiness probe.
    index_ready: bool,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let index_ready = match state.index.ready().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!("index readiness probe failed: {:#}", err);
            false
        }
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        index_ready,
    })
}

// ============ POST /chat ============

/// JSON request body for `POST /chat`.
#[derive(Deserialize)]
struct ChatRequest {
    /// Caller-chosen session identifier; reuse it to continue a conversation.
    session_id: String,
    question: String,
    /// Restrict retrieval to chunks from this ingested document.
    #[serde(default)]
    source: Option<String>,
}

/// JSON response body for `POST /chat`.
#[derive(Serialize)]
struct ChatResponse {
    session_id: String,
    answer: String,
}

/// Handler for `POST /chat`.
///
/// Runs the full pipeline for one question. The session transcript is only
/// extended when generation succeeds, so a failed request can be reissued
/// without leaving a half-recorded exchange behind.
async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let output = state
        .pipeline
        .query(
            &request.session_id,
            &request.question,
            request.source.as_deref(),
        )
        .await
        .map_err(classify_error)?;

    Ok(Json(ChatResponse {
        session_id: request.session_id,
        answer: output.answer,
    }))
}

// ============ POST /documents ============

/// Handler for `POST /documents`.
///
/// Multipart upload with a `file` part holding the PDF and an optional
/// `name` part overriding the document identifier (the uploaded file name
/// by default). Re-uploading an identifier reports `skipped = true`.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestReport>, AppError> {
    let mut bytes: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut override_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                file_name = field.file_name().map(|name| name.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;
                bytes = Some(data.to_vec());
            }
            Some("name") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;
                override_name = Some(text);
            }
            _ => {}
        }
    }

    let bytes = bytes.ok_or_else(|| bad_request("upload needs a 'file' part"))?;
    let source = resolve_identifier(override_name, file_name)?;

    let report = state
        .ingestor
        .add_bytes(&source, &bytes)
        .await
        .map_err(classify_error)?;
    Ok(Json(report))
}

/// Picks the document identifier for an upload: a non-blank `name` part wins,
/// otherwise the uploaded file name.
fn resolve_identifier(
    override_name: Option<String>,
    file_name: Option<String>,
) -> Result<String, AppError> {
    override_name
        .filter(|name| !name.trim().is_empty())
        .or(file_name.filter(|name| !name.trim().is_empty()))
        .ok_or_else(|| bad_request("upload needs a 'name' part or a file name"))
}

// ============ Session history ============

/// JSON response body for `GET /sessions/{id}/history`.
#[derive(Serialize)]
struct HistoryResponse {
    session_id: String,
    messages: Vec<Message>,
}

/// Handler for `GET /sessions/{id}/history`.
///
/// An unknown session id yields an empty transcript; the lookup never
/// creates a session.
async fn handle_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<HistoryResponse> {
    let messages = state.history.history(&id).await;
    Json(HistoryResponse {
        session_id: id,
        messages,
    })
}

/// Handler for `DELETE /sessions/{id}/history`.
///
/// Empties the transcript but keeps the session alive.
async fn handle_clear_history(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    state.history.clear(&id).await;
    StatusCode::NO_CONTENT
}
