use anyhow::{Context, Result};
use highscores::api::{AppState, run_api_server};
use highscores::config::ServerConfig;
use highscores::db;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if exists
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env().context("Invalid configuration")?;
    info!(
        "Starting leaderboard on {} with {} store",
        config.http_addr,
        config.store.kind()
    );

    let store = db::connect(&config).await?;
    let state = AppState::from_config(store, &config);

    let shutdown = CancellationToken::new();
    let server_shutdown = shutdown.clone();
    let addr = config.http_addr.clone();
    let mut server = tokio::spawn(async move { run_api_server(&addr, state, server_shutdown).await });

    tokio::select! {
        result = &mut server => {
            // The server only returns on its own when it failed to start or crashed
            result.context("API server task panicked")??;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("Received shutdown signal. Shutting down gracefully...");
        }
    }

    shutdown.cancel();
    server.await.context("API server task panicked")??;

    info!("Server shut down successfully");
    Ok(())
}
