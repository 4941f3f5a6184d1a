// Attribute helpers shared by the DynamoDB record store

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::models::ScoreRecord;

pub type Item = HashMap<String, AttributeValue>;

pub fn av_s(s: impl Into<String>) -> AttributeValue {
    AttributeValue::S(s.into())
}

pub fn av_n(n: impl ToString) -> AttributeValue {
    AttributeValue::N(n.to_string())
}

pub fn extract_string(item: &Item, key: &str) -> Option<String> {
    item.get(key).and_then(|v| v.as_s().ok()).cloned()
}

pub fn extract_i64(item: &Item, key: &str) -> Option<i64> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|s| s.parse::<i64>().ok())
}

pub fn extract_datetime(item: &Item, key: &str) -> Option<DateTime<Utc>> {
    extract_string(item, key)
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Item for either table. `pk` is the identity key for players and a random
/// id for results; `board` is the constant hash key of the `ByTime` index.
pub fn score_item(pk: &str, board: &str, record: &ScoreRecord) -> Item {
    let mut item = HashMap::new();
    item.insert("pk".to_string(), av_s(pk));
    item.insert("board".to_string(), av_s(board));
    item.insert("bestTime".to_string(), av_n(record.best_time));
    item.insert("name".to_string(), av_s(&record.name));
    item.insert("createdAt".to_string(), av_s(record.created_at.to_rfc3339()));
    item.insert("country".to_string(), av_s(&record.country));
    item.insert("region".to_string(), av_s(&record.region));
    item.insert("city".to_string(), av_s(&record.city));
    item.insert("cityLatLong".to_string(), av_s(&record.city_lat_long));
    item.insert("sourceIp".to_string(), av_s(&record.source_ip));
    item
}

/// Items missing a name, time or timestamp are skipped by the caller.
pub fn parse_score_item(item: &Item) -> Option<ScoreRecord> {
    Some(ScoreRecord {
        name: extract_string(item, "name")?,
        best_time: extract_i64(item, "bestTime")?,
        created_at: extract_datetime(item, "createdAt")?,
        country: extract_string(item, "country").unwrap_or_default(),
        region: extract_string(item, "region").unwrap_or_default(),
        city: extract_string(item, "city").unwrap_or_default(),
        city_lat_long: extract_string(item, "cityLatLong").unwrap_or_default(),
        source_ip: extract_string(item, "sourceIp").unwrap_or_default(),
    })
}
