//! Stored records
//!
//! These mirror the documents kept by the backing store. Search-time
//! entities (with aggregates such as rating averages) are hydrated from
//! them by the search engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A short text item posted by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vibe {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Tag usage counter maintained by the write path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub count: u64,
}

/// Emoji rating of a vibe, optionally with review text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: String,
    pub vibe_id: String,
    pub user_id: String,
    /// 1..=5
    pub value: u8,
    pub emoji: String,
    #[serde(default)]
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Search,
    Click,
    Error,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Search => "search",
            MetricKind::Click => "click",
            MetricKind::Error => "error",
        }
    }
}

/// Append-only analytics event. Never patched after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMetric {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: MetricKind,
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clicked_result_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clicked_result_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_position: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Aggregate frequency of a normalized query. `term` is the unique key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingTerm {
    pub term: String,
    pub count: u64,
    pub last_updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHistoryEntry {
    pub id: String,
    pub user_id: String,
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub result_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clicked_result_ids: Option<Vec<String>>,
}
