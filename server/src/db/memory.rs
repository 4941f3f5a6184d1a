use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use super::models::*;
use super::{RecordStore, StorageResult};

#[derive(Default)]
struct Tables {
    players: HashMap<String, PlayerRecord>,
    results: Vec<SubmissionRecord>,
}

/// Process-local store for development and tests. One lock covers both
/// collections, so the compare and the write of the best-score rule are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored player record for one identity key.
    pub async fn player(&self, identity_key: &str) -> Option<PlayerRecord> {
        self.tables.lock().await.players.get(identity_key).cloned()
    }

    pub async fn submission_count(&self) -> usize {
        self.tables.lock().await.results.len()
    }
}

/// The `limit` lowest times in ascending order. Only the returned rows are cloned.
fn lowest_times<'a, I>(records: I, limit: usize) -> Vec<ScoreRecord>
where
    I: IntoIterator<Item = &'a ScoreRecord>,
{
    let mut refs: Vec<&ScoreRecord> = records.into_iter().collect();
    if refs.len() > limit {
        refs.select_nth_unstable_by_key(limit, |r| r.best_time);
        refs.truncate(limit);
    }
    refs.sort_by_key(|r| r.best_time);
    refs.into_iter().cloned().collect()
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn upsert_best(
        &self,
        identity_key: &str,
        record: &ScoreRecord,
    ) -> StorageResult<UpsertOutcome> {
        let mut tables = self.tables.lock().await;

        let outcome = match tables.players.get(identity_key) {
            None => UpsertOutcome::Created,
            Some(existing) if record.best_time < existing.best_time => UpsertOutcome::Improved,
            Some(_) => UpsertOutcome::Kept,
        };
        if outcome != UpsertOutcome::Kept {
            tables
                .players
                .insert(identity_key.to_string(), record.clone());
        }

        tables.results.push(record.clone());
        debug!("Memory store: {} -> {:?}", identity_key, outcome);

        Ok(outcome)
    }

    async fn list_top_players(&self, limit: usize) -> StorageResult<Vec<PlayerRecord>> {
        let tables = self.tables.lock().await;
        Ok(lowest_times(tables.players.values(), limit))
    }

    async fn list_all_submissions(&self, limit: usize) -> StorageResult<Vec<SubmissionRecord>> {
        let tables = self.tables.lock().await;
        Ok(lowest_times(&tables.results, limit))
    }
}
