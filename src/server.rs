//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/analyze` | Index the repository if needed, then return the closest chunks |
//! | `GET`  | `/list-docs` | Page through stored entries (`?page=1&limit=20`) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "repo must be owner/project" } }
//! ```
//!
//! Error codes: `bad_request` (400), `no_match` (404), `store_error` (500),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the endpoints can be
//! called from a browser extension or an issue tracker page.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use repo_help_core::models::{EntryPage, Namespace};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::Error;
use crate::service::{Analysis, RepoHelp};

const DEFAULT_PAGE: usize = 1;
const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

#[derive(Clone)]
struct AppState {
    service: Arc<RepoHelp>,
    /// Cancelled on shutdown; requests run on child tokens.
    shutdown: CancellationToken,
}

/// Starts the HTTP server on `[server].bind` and serves until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = Arc::new(RepoHelp::from_config(config).await?);
    let shutdown = CancellationToken::new();
    let app = router_with_shutdown(service, shutdown.clone());

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("repo-help listening on http://{}", config.server.bind);
    tracing::info!(bind = %config.server.bind, "server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested, draining in-flight ingestion");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

/// Router over an existing service.
pub fn router(service: Arc<RepoHelp>) -> Router {
    router_with_shutdown(service, CancellationToken::new())
}

fn router_with_shutdown(service: Arc<RepoHelp>, shutdown: CancellationToken) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/analyze", post(handle_analyze))
        .route("/list-docs", get(handle_list_docs))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { service, shutdown })
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

/// Internal error type that converts into an HTTP response with a JSON body.
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

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match err {
            Error::EmptyFileList | Error::InvalidRequest(_) => bad_request(message),
            Error::NoMatch { .. } => AppError {
                status: StatusCode::NOT_FOUND,
                code: "no_match",
                message,
            },
            Error::Store(_) => {
                tracing::error!(error = %message, "store failure");
                AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "store_error",
                    message,
                }
            }
            Error::Embedding(_) | Error::Source(_) => {
                tracing::error!(error = %message, "request failed");
                AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "internal",
                    message,
                }
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

// ============ POST /analyze ============

#[derive(Deserialize)]
struct AnalyzeRequest {
    #[serde(default)]
    repo: String,
    #[serde(default, rename = "issueTitle")]
    issue_title: String,
    #[serde(default, rename = "issueBody")]
    issue_body: String,
}

async fn handle_analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<Analysis>, AppError> {
    let namespace = Namespace::parse(&req.repo)
        .ok_or_else(|| bad_request(format!("repo must be owner/project, got {:?}", req.repo)))?;

    let analysis = state
        .service
        .analyze(
            &namespace,
            &req.issue_title,
            &req.issue_body,
            state.shutdown.child_token(),
        )
        .await?;
    Ok(Json(analysis))
}

// ============ GET /list-docs ============

#[derive(Deserialize)]
struct ListParams {
    page: Option<usize>,
    limit: Option<usize>,
}

async fn handle_list_docs(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<EntryPage>, AppError> {
    let page = params.page.unwrap_or(DEFAULT_PAGE);
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let entries = state.service.list_entries(page, limit).await?;
    Ok(Json(entries))
}
