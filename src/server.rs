//! HTTP server.
//!
//! Exposes search, ingestion, and stats over a small JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/stats` | Corpus statistics |
//! | `GET`  | `/search?q=&k=&mode=&explain=` | Ranked search |
//! | `POST` | `/documents` | Add a document: `{ "content": ..., "metadata": {...} }` |
//! | `GET`  | `/documents?offset=&limit=` | List documents in insertion order |
//! | `POST` | `/reindex` | Rebuild the frequency index from a full store scan |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "document content must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `store_unavailable` (503).
//! Searches never error: a failed corpus fetch is a `200` with
//! `store_unavailable: true` and no results.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use quilt_search_core::error::{IngestError, StoreError};
use quilt_search_core::models::DocumentId;
use quilt_search_core::search::{SearchMode, SearchResponse};

use crate::config::Config;
use crate::engine::{open_engine, EngineStats, SearchEngine};
use crate::list::DocumentSummary;

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

/// Starts the HTTP server on `[server].bind`. Runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = Arc::new(open_engine(config).await?);
    let bind_addr = config.server.bind.clone();

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "server listening");
    println!("Quilt server listening on http://{}", bind_addr);

    axum::serve(listener, router(engine)).await?;
    Ok(())
}

/// Build the router over a shared engine.
pub fn router(engine: Arc<SearchEngine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/stats", get(handle_stats))
        .route("/search", get(handle_search))
        .route("/documents", get(handle_list).post(handle_add))
        .route("/reindex", post(handle_reindex))
        .layer(cors)
        .with_state(engine)
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
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn store_unavailable(err: &StoreError) -> AppError {
    tracing::warn!(error = %err, "store unavailable");
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "store_unavailable",
        message: err.to_string(),
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Store(e) => store_unavailable(&e),
            other => bad_request(other.to_string()),
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

// ============ GET /stats ============

async fn handle_stats(State(engine): State<Arc<SearchEngine>>) -> Result<Json<EngineStats>, AppError> {
    let stats = engine.stats().await.map_err(|e| store_unavailable(&e))?;
    Ok(Json(stats))
}

// ============ GET /search ============

#[derive(Deserialize)]
struct SearchParamsQuery {
    #[serde(default)]
    q: String,
    k: Option<i64>,
    mode: Option<String>,
    #[serde(default)]
    explain: bool,
}

async fn handle_search(
    State(engine): State<Arc<SearchEngine>>,
    Query(params): Query<SearchParamsQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    let mode = match params.mode.as_deref() {
        None => SearchMode::default(),
        Some(m) => m.parse().map_err(|e: anyhow::Error| bad_request(e.to_string()))?,
    };
    let response = engine.search(&params.q, mode, params.k, params.explain).await;
    Ok(Json(response))
}

// ============ POST /documents ============

#[derive(Deserialize)]
struct AddDocumentRequest {
    content: String,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct AddDocumentResponse {
    id: DocumentId,
}

async fn handle_add(
    State(engine): State<Arc<SearchEngine>>,
    body: Result<Json<AddDocumentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AddDocumentResponse>), AppError> {
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;
    let id = engine.add_document(&req.content, req.metadata).await?;
    Ok((StatusCode::CREATED, Json(AddDocumentResponse { id })))
}

// ============ GET /documents ============

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    offset: usize,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct ListResponse {
    documents: Vec<DocumentSummary>,
}

async fn handle_list(
    State(engine): State<Arc<SearchEngine>>,
    Query(params): Query<ListQuery>,
) -> Result<Json<ListResponse>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let docs = engine
        .list_documents(params.offset, limit)
        .await
        .map_err(|e| store_unavailable(&e))?;
    Ok(Json(ListResponse {
        documents: docs.into_iter().map(DocumentSummary::from).collect(),
    }))
}

// ============ POST /reindex ============

#[derive(Serialize)]
struct ReindexResponse {
    documents: usize,
}

async fn handle_reindex(
    State(engine): State<Arc<SearchEngine>>,
) -> Result<Json<ReindexResponse>, AppError> {
    let documents = engine
        .rebuild_index()
        .await
        .map_err(|e| store_unavailable(&e))?;
    Ok(Json(ReindexResponse { documents }))
}
