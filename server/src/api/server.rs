use anyhow::{Context, Result};
use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use super::{leaderboard, submit};
use crate::config::ServerConfig;
use crate::db::RecordStore;
use crate::submission::SubmissionService;

/// Shared state handed to every handler. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    /// Record store backing both the listings and the submissions
    pub store: Arc<dyn RecordStore>,
    /// Submission handler wired to the same store
    pub submissions: Arc<SubmissionService>,
    /// Title of the HTML leaderboard
    pub page_title: Arc<str>,
    /// Whether proxy headers may override the peer address
    pub trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            submissions: Arc::new(SubmissionService::new(store.clone())),
            store,
            page_title: Arc::from("Highscores"),
            trust_forwarded_for: false,
        }
    }

    pub fn from_config(store: Arc<dyn RecordStore>, config: &ServerConfig) -> Self {
        Self {
            page_title: Arc::from(config.page_title.as_str()),
            trust_forwarded_for: config.trust_forwarded_for,
            ..Self::new(store)
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    // Browser builds of the game post from other origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/",
            get(leaderboard::players_page).post(submit::submit_score),
        )
        .route("/players.json", get(leaderboard::players_json))
        .route("/results.json", get(leaderboard::results_json))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve `app` on an already bound listener until `shutdown` is cancelled.
/// Peer addresses are exposed to handlers through `ConnectInfo`.
pub async fn serve(listener: TcpListener, app: Router, shutdown: CancellationToken) -> Result<()> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await
    .map_err(|e| anyhow::anyhow!("API server error: {}", e))
}

pub async fn run_api_server(addr: &str, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server to {}", addr))?;
    info!("API server listening on {}", addr);

    serve(listener, build_router(state), shutdown).await
}

async fn health_check() -> &'static str {
    "OK"
}
