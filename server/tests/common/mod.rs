#![allow(dead_code)]

pub mod test_server;
pub mod test_stores;

pub use test_server::TestServer;
pub use test_stores::{CountingStore, FailingStore};

/// Macro to wrap test functions with a timeout to prevent hanging tests
#[macro_export]
macro_rules! timeout_test {
    ($duration:expr, $body:expr) => {
        tokio::time::timeout($duration, $body)
            .await
            .map_err(|_| anyhow::anyhow!("Test timed out after {:?}", $duration))?
    };
}
