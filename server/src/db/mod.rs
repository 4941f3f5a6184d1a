pub mod dynamodb;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod queries;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::{ServerConfig, StoreBackend};
use models::*;

/// Row cap for the best-score listings (`/` and `/players.json`).
pub const TOP_PLAYERS_LIMIT: usize = 200;
/// Row cap for the submission history (`/results.json`).
pub const SUBMISSIONS_LIMIT: usize = 1000;

/// Opaque failure from the backing database. Callers only log it or map it
/// to a status code; format with `{:#}` to get the whole context chain.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct StorageError(#[from] anyhow::Error);

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Apply the best-score rule for `identity_key` and append `record` to the
    /// submission history.
    ///
    /// The stored player record is replaced only when `record.best_time` is
    /// strictly lower. The history append runs even when the player write
    /// fails; the first error is returned.
    async fn upsert_best(
        &self,
        identity_key: &str,
        record: &ScoreRecord,
    ) -> StorageResult<UpsertOutcome>;

    /// Player records ordered by ascending time, at most `limit` rows.
    async fn list_top_players(&self, limit: usize) -> StorageResult<Vec<PlayerRecord>>;

    /// Submission history ordered by ascending time, at most `limit` rows.
    async fn list_all_submissions(&self, limit: usize) -> StorageResult<Vec<SubmissionRecord>>;
}

/// Build the store selected by configuration.
pub async fn connect(config: &ServerConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match &config.store {
        StoreBackend::Postgres(pg) => {
            Arc::new(postgres::PostgresStore::connect(pg).await?)
        }
        StoreBackend::DynamoDb { table_prefix } => {
            Arc::new(dynamodb::DynamoStore::new(table_prefix).await?)
        }
        StoreBackend::Memory => Arc::new(memory::MemoryStore::new()),
    };

    info!("Record store ready: {}", config.store.kind());
    Ok(store)
}

/// Combine the two independent writes of `upsert_best`. The player write's
/// error wins; a history error alongside it is only logged.
pub(crate) fn merge_write_results(
    identity_key: &str,
    player: anyhow::Result<UpsertOutcome>,
    history: anyhow::Result<()>,
) -> StorageResult<UpsertOutcome> {
    match (player, history) {
        (Ok(outcome), Ok(())) => Ok(outcome),
        (Err(e), history) => {
            if let Err(history_err) = history {
                error!("History append also failed for {}: {:#}", identity_key, history_err);
            }
            Err(StorageError::from(e))
        }
        (Ok(_), Err(e)) => Err(StorageError::from(e)),
    }
}
