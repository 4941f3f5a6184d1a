use anyhow::anyhow;
use async_trait::async_trait;
use highscores::db::memory::MemoryStore;
use highscores::db::models::{PlayerRecord, ScoreRecord, SubmissionRecord, UpsertOutcome};
use highscores::db::{RecordStore, StorageResult};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Memory store that counts every call made to it.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn upsert_best(
        &self,
        identity_key: &str,
        record: &ScoreRecord,
    ) -> StorageResult<UpsertOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert_best(identity_key, record).await
    }

    async fn list_top_players(&self, limit: usize) -> StorageResult<Vec<PlayerRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_top_players(limit).await
    }

    async fn list_all_submissions(&self, limit: usize) -> StorageResult<Vec<SubmissionRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_all_submissions(limit).await
    }
}

/// Store whose every operation fails, as if the database were unreachable.
#[derive(Default)]
pub struct FailingStore {
    writes: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn upsert_best(
        &self,
        _identity_key: &str,
        _record: &ScoreRecord,
    ) -> StorageResult<UpsertOutcome> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("datastore unavailable").into())
    }

    async fn list_top_players(&self, _limit: usize) -> StorageResult<Vec<PlayerRecord>> {
        Err(anyhow!("datastore unavailable").into())
    }

    async fn list_all_submissions(&self, _limit: usize) -> StorageResult<Vec<SubmissionRecord>> {
        Err(anyhow!("datastore unavailable").into())
    }
}
