use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single score as stored by the record store.
///
/// The serialized field names are the ones game clients and dashboards already
/// read from `/players.json` and `/results.json`, so they stay PascalCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "PascalCase")]
pub struct ScoreRecord {
    pub name: String,
    #[serde(rename = "Time")]
    pub best_time: i64,
    pub created_at: DateTime<Utc>,
    pub country: String,
    pub region: String,
    pub city: String,
    pub city_lat_long: String,
    #[serde(rename = "IP")]
    pub source_ip: String,
}

impl ScoreRecord {
    /// Key used to deduplicate leaderboard rows: the display name followed
    /// directly by the source IP. The same name behind a different IP is a
    /// different player.
    pub fn identity_key(&self) -> String {
        format!("{}{}", self.name, self.source_ip)
    }
}

/// Best-known score for one identity key.
pub type PlayerRecord = ScoreRecord;

/// Immutable history entry for one accepted submission.
pub type SubmissionRecord = ScoreRecord;

/// Which branch of the best-score rule a write took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record existed for the key; the submission was stored.
    Created,
    /// The submission beat the stored time and replaced it.
    Improved,
    /// The stored record was at least as good and was left alone.
    Kept,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, ip: &str, time: i64) -> ScoreRecord {
        ScoreRecord {
            name: name.to_string(),
            best_time: time,
            created_at: Utc::now(),
            country: "se".to_string(),
            region: String::new(),
            city: String::new(),
            city_lat_long: String::new(),
            source_ip: ip.to_string(),
        }
    }

    #[test]
    fn test_identity_key_concatenates_name_and_ip() {
        assert_eq!(record("Ann", "1.2.3.4", 120).identity_key(), "Ann1.2.3.4");
        assert_ne!(
            record("Ann", "1.2.3.4", 1).identity_key(),
            record("Ann", "5.6.7.8", 1).identity_key()
        );
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(record("Ann", "1.2.3.4", 90)).unwrap();
        assert_eq!(json["Name"], "Ann");
        assert_eq!(json["Time"], 90);
        assert_eq!(json["IP"], "1.2.3.4");
        assert_eq!(json["Country"], "se");
        assert!(json.get("CityLatLong").is_some());
        assert!(json.get("CreatedAt").is_some());
    }
}
