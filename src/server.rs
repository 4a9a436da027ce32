//! HTTP API over a shared [`QaEngine`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/query` | Answer a question: `{"question": "...", "k": 3}` |
//! | `POST` | `/ingest` | Add a document: `{"document_id": "...", "text": "..."}` |
//! | `POST` | `/reset` | Clear the knowledge base |
//! | `GET`  | `/stats` | Document and unit counts, model, dimensions |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `model_unavailable` (503), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front-ends
//! can call the API directly.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use docqa_core::models::IndexStats;
use docqa_core::{QaEngine, QaError, QueryResponse};

use crate::app::build_engine;
use crate::config::Config;

#[derive(Clone)]
struct AppState {
    engine: Arc<QaEngine>,
    excerpt_chars: usize,
}

/// Build the API router around `engine`.
pub fn build_router(engine: Arc<QaEngine>, excerpt_chars: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/query", post(handle_query))
        .route("/ingest", post(handle_ingest))
        .route("/reset", post(handle_reset))
        .route("/stats", get(handle_stats))
        .layer(cors)
        .with_state(AppState {
            engine,
            excerpt_chars,
        })
}

/// Build the engine, load the embedding model, and serve on `[server].bind`
/// until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = build_engine(config).await?;
    // fail at startup rather than on the first request
    engine.embedder().ensure_ready().await?;

    let app = build_router(Arc::new(engine), config.retrieval.excerpt_chars);
    let bind_addr = &config.server.bind;
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "server listening");
    println!("docqa server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn model_unavailable(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "model_unavailable".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<QaError> for AppError {
    fn from(err: QaError) -> Self {
        match err {
            QaError::InvalidInput(msg) => bad_request(msg),
            QaError::ModelInit(_) => model_unavailable(err.to_string()),
            other => {
                tracing::error!(error = %other, "request failed");
                internal(other.to_string())
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
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

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
    #[serde(default)]
    k: Option<usize>,
}

async fn handle_query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let Json(req) = payload?;
    if req.k == Some(0) {
        return Err(bad_request("k must be >= 1"));
    }
    let answer = state.engine.query(&req.question, req.k).await?;
    Ok(Json(answer.to_response(state.excerpt_chars)))
}

// ============ POST /ingest ============

#[derive(Deserialize)]
struct IngestRequest {
    document_id: String,
    text: String,
}

#[derive(Serialize)]
struct IngestResponse {
    units_added: usize,
}

async fn handle_ingest(
    State(state): State<AppState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestResponse>, AppError> {
    let Json(req) = payload?;
    if req.document_id.trim().is_empty() {
        return Err(bad_request("document_id must not be empty"));
    }
    let units_added = state.engine.ingest(&req.document_id, &req.text).await?;
    Ok(Json(IngestResponse { units_added }))
}

// ============ POST /reset ============

#[derive(Serialize)]
struct StatusResponse {
    status: String,
}

async fn handle_reset(State(state): State<AppState>) -> Result<Json<StatusResponse>, AppError> {
    state.engine.reset().await?;
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
    }))
}

// ============ GET /stats ============

async fn handle_stats(State(state): State<AppState>) -> Json<IndexStats> {
    Json(state.engine.stats().await)
}
