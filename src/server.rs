use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Json,
    Router,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{error, live::LiveService};

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Clone)]
pub struct AppState {
    live: Arc<LiveService>,
    timeout: Duration,
}

impl AppState {
    pub fn new(live: Arc<LiveService>, timeout: Duration) -> Self {
        Self { live, timeout }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    question: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    answer: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    entries: usize,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ReloadResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    entries: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// The HTTP surface: `POST /chat`, `GET /health` and `POST /reload`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/health", get(health))
        .route("/reload", post(reload))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Answer one question.
///
/// The body is parsed by hand so that a missing body, malformed JSON, a
/// missing `question` or a body that cannot be read (for instance one over
/// the size limit) all degrade to the empty question instead of a 4xx.
async fn chat(
    State(state): State<AppState>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> (StatusCode, Json<ChatResponse>) {
    let request: ChatRequest = match body {
        Ok(body) => serde_json::from_slice(&body).unwrap_or_default(),
        Err(rejection) => {
            tracing::warn!(error = %rejection, "unreadable chat request body");
            ChatRequest::default()
        }
    };
    let question = request.question.unwrap_or_default();

    let service = state.live.snapshot();
    let unavailable = service.messages().unavailable.clone();
    let work = tokio::task::spawn_blocking(move || service.answer(&question));

    let failure = match tokio::time::timeout(state.timeout, work).await {
        Ok(Ok(Ok(reply))) => {
            return (
                StatusCode::OK,
                Json(ChatResponse {
                    answer: reply.answer,
                }),
            );
        }
        Ok(Ok(Err(e))) => e.to_string(),
        Ok(Err(join)) => format!("query worker failed: {join}"),
        Err(_) => format!("query timed out after {:?}", state.timeout),
    };

    tracing::error!(error = %failure, "failed to answer question");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ChatResponse {
            answer: unavailable,
        }),
    )
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        entries: state.live.snapshot().knowledge_base().len(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn reload(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReloadResponse>) {
    let live = state.live.clone();
    let result = tokio::task::spawn_blocking(move || live.reload())
        .await
        .map_err(|e| format!("reload worker failed: {e}"))
        .and_then(|r| r.map_err(|e| e.to_string()));

    match result {
        Ok(entries) => (
            StatusCode::OK,
            Json(ReloadResponse {
                ok: true,
                entries: Some(entries),
                error: None,
            }),
        ),
        Err(error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ReloadResponse {
                ok: false,
                entries: None,
                error: Some(error),
            }),
        ),
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutting down"),
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    }
}

pub fn run_server(
    live: Arc<LiveService>,
    bind: SocketAddr,
    timeout: Duration,
) -> error::Result<()> {
    let app = router(AppState::new(live, timeout));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error::Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(bind).await?;
        tracing::info!(address = %listener.local_addr()?, "listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok::<(), error::Error>(())
    })
}
