use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::error::Category;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::models::{ScoreRecord, UpsertOutcome};
use crate::db::{RecordStore, StorageResult};

/// Body of `POST /` as sent by the game client.
#[derive(Debug, Deserialize)]
struct ScorePayload {
    name: String,
    time: i64,
}

/// A score that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreSubmission {
    pub name: String,
    pub time: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The body is not JSON at all.
    #[error("Malformed JSON body: {0}")]
    Malformed(String),
    /// JSON, but a required field is missing, empty or of the wrong type.
    #[error("Invalid submission: {0}")]
    Invalid(String),
}

impl ScoreSubmission {
    /// Parse and validate a raw request body. `name` must be a non-empty
    /// string and `time` an integer; zero is a valid time.
    pub fn from_json(body: &[u8]) -> Result<Self, ValidationError> {
        let payload: ScorePayload = serde_json::from_slice(body).map_err(|e| match e.classify() {
            Category::Data => ValidationError::Invalid(e.to_string()),
            Category::Syntax | Category::Eof | Category::Io => {
                ValidationError::Malformed(e.to_string())
            }
        })?;

        if payload.name.is_empty() {
            return Err(ValidationError::Invalid("name must not be empty".to_string()));
        }

        Ok(Self {
            name: payload.name,
            time: payload.time,
        })
    }
}

/// What the hosting environment tells us about the submitting client.
/// Every field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    pub country: String,
    pub region: String,
    pub city: String,
    pub city_lat_long: String,
    /// Client IP without the port
    pub source_ip: String,
}

/// Turns validated submissions into stored records.
pub struct SubmissionService {
    store: Arc<dyn RecordStore>,
}

impl SubmissionService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn build_record(
        submission: &ScoreSubmission,
        metadata: &RequestMetadata,
        created_at: DateTime<Utc>,
    ) -> ScoreRecord {
        ScoreRecord {
            name: submission.name.clone(),
            best_time: submission.time,
            created_at,
            country: metadata.country.clone(),
            region: metadata.region.clone(),
            city: metadata.city.clone(),
            city_lat_long: metadata.city_lat_long.clone(),
            source_ip: metadata.source_ip.clone(),
        }
    }

    /// Store the submission under its identity key and in the history.
    pub async fn submit(
        &self,
        submission: &ScoreSubmission,
        metadata: &RequestMetadata,
    ) -> StorageResult<UpsertOutcome> {
        let record = Self::build_record(submission, metadata, Utc::now());
        let identity_key = record.identity_key();
        info!("Received score {:?} from {:?}", submission, metadata);

        let outcome = self.store.upsert_best(&identity_key, &record).await?;
        match outcome {
            UpsertOutcome::Created => info!("Saving player[{}] = {:?}", identity_key, record),
            UpsertOutcome::Improved => info!("Updating player[{}] = {:?}", identity_key, record),
            UpsertOutcome::Kept => debug!(
                "Keeping player[{}], {} is not better",
                identity_key, record.best_time
            ),
        }

        Ok(outcome)
    }
}
