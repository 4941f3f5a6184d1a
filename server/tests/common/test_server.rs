use anyhow::Result;
use highscores::api::{AppState, build_router, serve};
use highscores::db::RecordStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The real router served on a random local port.
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<Result<()>>,
}

impl TestServer {
    pub async fn start(store: Arc<dyn RecordStore>) -> Result<Self> {
        Self::start_with_state(AppState::new(store)).await
    }

    pub async fn start_with_state(state: AppState) -> Result<Self> {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        // Port 0 means random available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(serve(listener, build_router(state), shutdown.clone()));
        info!("Test server listening on {}", addr);

        Ok(Self {
            addr,
            shutdown,
            handle,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn shutdown(self) -> Result<()> {
        self.shutdown.cancel();
        self.handle.await??;
        Ok(())
    }
}
