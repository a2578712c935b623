//! Backing store interface
//!
//! The search pipeline never talks to a concrete database. It goes through
//! [`Repository`], which exposes the handful of primitives the pipeline
//! needs: a capped scan, a secondary-index lookup, a text-index lookup and
//! single-record writes. [`MemoryStore`] is the in-process implementation
//! used by the binary and by tests.
//!
//! Reads are read-committed at best. The pipeline issues several
//! independent reads per call (candidates, then ratings per vibe, then
//! vibe counts per user) and a concurrent writer may land between them,
//! so a vibe can be counted while one of its ratings is missed. Callers
//! must not assume snapshot isolation across calls.

pub mod identity;
pub mod memory;
pub mod model;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use identity::{Identity, IdentityProvider, StaticIdentity};
pub use memory::MemoryStore;
pub use model::{
    MetricKind, Rating, SearchHistoryEntry, SearchMetric, Tag, TrendingTerm, User, Vibe,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Collection {0} is unavailable")]
    Unavailable(Collection),
    #[error("Document {id} not found in {collection}")]
    NotFound { collection: Collection, id: String },
    #[error("Document {id} already exists in {collection}")]
    Duplicate { collection: Collection, id: String },
    #[error("Snapshot IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Snapshot decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Named buckets of documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Vibes,
    Users,
    Tags,
    Ratings,
    SearchMetrics,
    TrendingTerms,
    SearchHistory,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Vibes,
        Collection::Users,
        Collection::Tags,
        Collection::Ratings,
        Collection::SearchMetrics,
        Collection::TrendingTerms,
        Collection::SearchHistory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Vibes => "vibes",
            Collection::Users => "users",
            Collection::Tags => "tags",
            Collection::Ratings => "ratings",
            Collection::SearchMetrics => "searchMetrics",
            Collection::TrendingTerms => "trendingSearches",
            Collection::SearchHistory => "searchHistory",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secondary indexes the store maintains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Index {
    VibesByCreator,
    VibesByCreatedAt,
    UsersByUsername,
    UsersById,
    RatingsByVibe,
    RatingsByUser,
    HistoryByUser,
    TrendingByTerm,
    TrendingByCount,
}

impl Index {
    pub fn collection(&self) -> Collection {
        match self {
            Index::VibesByCreator | Index::VibesByCreatedAt => Collection::Vibes,
            Index::UsersByUsername | Index::UsersById => Collection::Users,
            Index::RatingsByVibe | Index::RatingsByUser => Collection::Ratings,
            Index::HistoryByUser => Collection::SearchHistory,
            Index::TrendingByTerm | Index::TrendingByCount => Collection::TrendingTerms,
        }
    }
}

/// Lookup against a named secondary index
#[derive(Debug, Clone, PartialEq)]
pub enum IndexQuery {
    /// Equality on the indexed field. Ids compare exactly, usernames ignore
    /// case. `HistoryByUser` returns the most recent entries first.
    Eq { index: Index, value: String },
    /// Inclusive timestamp range, ascending
    Range {
        index: Index,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },
    /// Whole index in index order. `TrendingByCount` ascends by count, then
    /// by last update, so the ascending head is the eviction order.
    Ordered { index: Index, descending: bool },
}

impl IndexQuery {
    pub fn eq(index: Index, value: impl Into<String>) -> Self {
        IndexQuery::Eq {
            index,
            value: value.into(),
        }
    }

    pub fn index(&self) -> Index {
        match self {
            IndexQuery::Eq { index, .. }
            | IndexQuery::Range { index, .. }
            | IndexQuery::Ordered { index, .. } => *index,
        }
    }
}

/// Any record the store can hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "collection", rename_all = "camelCase")]
pub enum Document {
    Vibe(Vibe),
    User(User),
    Tag(Tag),
    Rating(Rating),
    Metric(SearchMetric),
    Trending(TrendingTerm),
    History(SearchHistoryEntry),
}

impl Document {
    pub fn collection(&self) -> Collection {
        match self {
            Document::Vibe(_) => Collection::Vibes,
            Document::User(_) => Collection::Users,
            Document::Tag(_) => Collection::Tags,
            Document::Rating(_) => Collection::Ratings,
            Document::Metric(_) => Collection::SearchMetrics,
            Document::Trending(_) => Collection::TrendingTerms,
            Document::History(_) => Collection::SearchHistory,
        }
    }

    /// Primary key. Trending terms are keyed by their normalized term.
    pub fn id(&self) -> &str {
        match self {
            Document::Vibe(v) => &v.id,
            Document::User(u) => &u.id,
            Document::Tag(t) => &t.id,
            Document::Rating(r) => &r.id,
            Document::Metric(m) => &m.id,
            Document::Trending(t) => &t.term,
            Document::History(h) => &h.id,
        }
    }

    /// Fields covered by the text index
    pub fn searchable_text(&self) -> Vec<&str> {
        match self {
            Document::Vibe(v) => {
                let mut fields = vec![v.title.as_str(), v.description.as_str()];
                fields.extend(v.tags.iter().map(String::as_str));
                fields
            }
            Document::User(u) => {
                let mut fields = vec![u.username.as_str()];
                fields.extend(u.full_name.as_deref());
                fields.extend(u.bio.as_deref());
                fields
            }
            Document::Tag(t) => vec![t.name.as_str()],
            Document::Rating(r) => {
                let mut fields = vec![r.emoji.as_str()];
                fields.extend(r.review.as_deref());
                fields
            }
            Document::Metric(m) => vec![m.query.as_str()],
            Document::Trending(t) => vec![t.term.as_str()],
            Document::History(h) => vec![h.query.as_str()],
        }
    }

    pub fn into_vibe(self) -> Option<Vibe> {
        match self {
            Document::Vibe(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_user(self) -> Option<User> {
        match self {
            Document::User(u) => Some(u),
            _ => None,
        }
    }

    pub fn into_tag(self) -> Option<Tag> {
        match self {
            Document::Tag(t) => Some(t),
            _ => None,
        }
    }

    pub fn into_rating(self) -> Option<Rating> {
        match self {
            Document::Rating(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_trending(self) -> Option<TrendingTerm> {
        match self {
            Document::Trending(t) => Some(t),
            _ => None,
        }
    }

    pub fn into_history(self) -> Option<SearchHistoryEntry> {
        match self {
            Document::History(h) => Some(h),
            _ => None,
        }
    }
}

/// Storage primitives the search and analytics layers are written against
#[async_trait]
pub trait Repository: Send + Sync {
    /// Up to `limit` documents of a collection, in primary key order
    async fn scan(&self, collection: Collection, limit: usize) -> StoreResult<Vec<Document>>;

    /// Up to `limit` documents selected through a secondary index
    async fn lookup(&self, query: IndexQuery, limit: usize) -> StoreResult<Vec<Document>>;

    /// Up to `limit` documents whose text-indexed fields contain `text`
    async fn text_search(
        &self,
        collection: Collection,
        text: &str,
        limit: usize,
    ) -> StoreResult<Vec<Document>>;

    async fn insert(&self, document: Document) -> StoreResult<String>;

    /// Replace the document stored under `id`
    async fn patch(&self, id: &str, document: Document) -> StoreResult<()>;

    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<()>;
}

/// Kinds of entities a search can return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    #[serde(rename = "vibes")]
    Vibe,
    #[serde(rename = "users")]
    User,
    #[serde(rename = "tags")]
    Tag,
    #[serde(rename = "reviews")]
    Review,
    #[serde(rename = "actions")]
    Action,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Vibe,
        EntityKind::User,
        EntityKind::Tag,
        EntityKind::Review,
        EntityKind::Action,
    ];

    /// Kinds searched when the caller does not name any
    pub const DEFAULT: [EntityKind; 4] = [
        EntityKind::Vibe,
        EntityKind::User,
        EntityKind::Tag,
        EntityKind::Action,
    ];

    /// Response key, also accepted in `includeTypes`
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Vibe => "vibes",
            EntityKind::User => "users",
            EntityKind::Tag => "tags",
            EntityKind::Review => "reviews",
            EntityKind::Action => "actions",
        }
    }

    /// Label of one entity, as in a result's `type` field
    pub fn singular(&self) -> &'static str {
        match self {
            EntityKind::Vibe => "vibe",
            EntityKind::User => "user",
            EntityKind::Tag => "tag",
            EntityKind::Review => "review",
            EntityKind::Action => "action",
        }
    }

    /// Collection holding this kind, if it is stored at all
    pub fn collection(&self) -> Option<Collection> {
        match self {
            EntityKind::Vibe => Some(Collection::Vibes),
            EntityKind::User => Some(Collection::Users),
            EntityKind::Tag => Some(Collection::Tags),
            EntityKind::Review => Some(Collection::Ratings),
            EntityKind::Action => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vibe" | "vibes" => Ok(EntityKind::Vibe),
            "user" | "users" => Ok(EntityKind::User),
            "tag" | "tags" => Ok(EntityKind::Tag),
            "review" | "reviews" => Ok(EntityKind::Review),
            "action" | "actions" => Ok(EntityKind::Action),
            other => Err(format!("Unknown result type '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_parsing() {
        assert_eq!("vibes".parse::<EntityKind>(), Ok(EntityKind::Vibe));
        assert_eq!("User".parse::<EntityKind>(), Ok(EntityKind::User));
        assert_eq!(" reviews ".parse::<EntityKind>(), Ok(EntityKind::Review));
        assert!("emoji".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_index_collections() {
        assert_eq!(Index::VibesByCreator.collection(), Collection::Vibes);
        assert_eq!(Index::RatingsByVibe.collection(), Collection::Ratings);
        assert_eq!(Index::TrendingByCount.collection(), Collection::TrendingTerms);
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Unavailable(Collection::Users);
        assert_eq!(err.to_string(), "Collection users is unavailable");

        let err = StoreError::NotFound {
            collection: Collection::Vibes,
            id: "v1".to_string(),
        };
        assert_eq!(err.to_string(), "Document v1 not found in vibes");
    }
}
