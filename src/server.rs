//! HTTP JSON API.
//!
//! The interactive surface over one shared [`ChatSession`]: upload and
//! select documents, chat, read the transcript, and fetch market snapshots.
//! Browser clients are expected, so CORS is wide open.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/documents` | List documents and the active one |
//! | `POST` | `/documents` | Upload a PDF (`{name, data}` with base64 data) |
//! | `POST` | `/documents/example` | Load the bundled example report |
//! | `POST` | `/documents/select` | Make a document active (`{name}`) |
//! | `GET`  | `/transcript` | The active document's chat transcript |
//! | `POST` | `/chat` | Ask a question (`{question}`) |
//! | `GET`  | `/market/tickers` | The fixed ticker list |
//! | `GET`  | `/market/{ticker}` | One year of daily candlestick history |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//! Pipeline failures do not use this envelope — they land in the transcript
//! as assistant error turns, exactly as the chat surface shows them.
//!
//! The session sits behind a `tokio::sync::Mutex`, so questions are answered
//! strictly in submission order and transcript appends can never interleave.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::market::{self, MarketDataProvider, TICKERS};
use crate::pipeline::Collaborators;
use crate::session::ChatSession;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<ChatSession>>,
    market: Arc<dyn MarketDataProvider>,
    config: Arc<Config>,
}

/// Start the HTTP server, wiring hosted collaborators from the config.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let collaborators =
        Collaborators::from_config(config).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let provider =
        market::create_market_provider(&config.market).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    run_server_with(config, collaborators, Arc::from(provider)).await
}

/// Start the HTTP server with explicit collaborators (used by tests).
pub async fn run_server_with(
    config: &Config,
    collaborators: Collaborators,
    provider: Arc<dyn MarketDataProvider>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        session: Arc::new(Mutex::new(ChatSession::new(config.clone(), collaborators))),
        market: provider,
        config: Arc::new(config.clone()),
    };

    let app = router(state);

    println!("Finsight API listening on http://{}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/documents", get(list_documents).post(upload_document))
        .route("/documents/example", post(load_example))
        .route("/documents/select", post(select_document))
        .route("/transcript", get(transcript))
        .route("/chat", post(chat))
        .route("/market/tickers", get(tickers))
        .route("/market/{ticker}", get(market_snapshot))
        .layer(cors)
        .with_state(state)
}

// ============ Error Envelope ============

struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "not_found",
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": { "code": self.code, "message": self.message }
        });
        (self.status, Json(body)).into_response()
    }
}

// ============ Handlers ============

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_documents(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.lock().await;
    Json(serde_json::json!({
        "documents": session.document_names(),
        "active": session.active_document(),
    }))
}

#[derive(Deserialize)]
struct UploadRequest {
    name: String,
    /// Base64-encoded PDF bytes.
    data: String,
}

async fn upload_document(
    State(state): State<AppState>,
    Json(req): Json<UploadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("name must not be empty"));
    }
    if !req.name.to_lowercase().ends_with(".pdf") {
        return Err(ApiError::bad_request("only PDF documents are supported"));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(req.data.as_bytes())
        .map_err(|_| ApiError::bad_request("data must be valid base64"))?;

    let mut session = state.session.lock().await;
    session.add_document(&req.name, bytes);
    Ok(Json(serde_json::json!({
        "documents": session.document_names(),
        "active": session.active_document(),
    })))
}

async fn load_example(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.lock().await;
    let name = session.load_example().map_err(ApiError::not_found)?;
    Ok(Json(serde_json::json!({
        "loaded": name,
        "active": session.active_document(),
    })))
}

#[derive(Deserialize)]
struct SelectRequest {
    name: String,
}

async fn select_document(
    State(state): State<AppState>,
    Json(req): Json<SelectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut session = state.session.lock().await;
    session
        .select_document(&req.name)
        .map_err(ApiError::not_found)?;
    Ok(Json(serde_json::json!({ "active": session.active_document() })))
}

async fn transcript(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.lock().await;
    Json(serde_json::json!({
        "active": session.active_document(),
        "turns": session.transcript(),
    }))
}

#[derive(Deserialize)]
struct ChatRequest {
    question: String,
}

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.question.trim().is_empty() {
        return Err(ApiError::bad_request("question must not be empty"));
    }

    // Holding the lock across the pipeline call serializes questions and
    // keeps transcript order equal to submission order.
    let mut session = state.session.lock().await;
    let turn = session
        .submit_question(&req.question)
        .await
        .map_err(ApiError::bad_request)?;
    Ok(Json(serde_json::json!({ "turn": turn })))
}

async fn tickers() -> impl IntoResponse {
    Json(serde_json::json!({ "tickers": TICKERS }))
}

async fn market_snapshot(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> impl IntoResponse {
    let snapshot =
        market::fetch_snapshot(state.market.as_ref(), &ticker, &state.config.market.range).await;
    Json(serde_json::json!({ "snapshot": snapshot }))
}
