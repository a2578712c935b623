//! In-process document store with JSON snapshot persistence
//!
//! Snapshots are written atomically: the payload goes to a `.tmp` file
//! while an exclusive lock is held on a sibling `.lock` file, then the
//! temporary file is renamed over the snapshot.

use super::model::{Rating, SearchHistoryEntry, SearchMetric, Tag, TrendingTerm, User, Vibe};
use super::{Collection, Document, Index, IndexQuery, Repository, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// On-disk layout of a [`MemoryStore`]
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub vibes: Vec<Vibe>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub ratings: Vec<Rating>,
    #[serde(default)]
    pub search_metrics: Vec<SearchMetric>,
    #[serde(default)]
    pub trending_searches: Vec<TrendingTerm>,
    #[serde(default)]
    pub search_history: Vec<SearchHistoryEntry>,
}

impl Snapshot {
    fn into_documents(self) -> impl Iterator<Item = Document> {
        self.vibes
            .into_iter()
            .map(Document::Vibe)
            .chain(self.users.into_iter().map(Document::User))
            .chain(self.tags.into_iter().map(Document::Tag))
            .chain(self.ratings.into_iter().map(Document::Rating))
            .chain(self.search_metrics.into_iter().map(Document::Metric))
            .chain(self.trending_searches.into_iter().map(Document::Trending))
            .chain(self.search_history.into_iter().map(Document::History))
    }
}

type Buckets = HashMap<Collection, BTreeMap<String, Document>>;

/// [`Repository`] backed by ordered in-memory maps
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Buckets>,
    unavailable: RwLock<HashSet<Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut buckets: Buckets = HashMap::new();
        for document in snapshot.into_documents() {
            buckets
                .entry(document.collection())
                .or_default()
                .insert(document.id().to_string(), document);
        }

        Self {
            collections: RwLock::new(buckets),
            unavailable: RwLock::new(HashSet::new()),
        }
    }

    /// Load a snapshot file; a missing file yields an empty store
    pub fn load(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            debug!("No snapshot at {}, starting empty", path.display());
            return Ok(Self::new());
        }

        let data = fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&data)?;
        info!(
            "Loaded snapshot {} ({} vibes, {} users, {} tags, {} ratings)",
            path.display(),
            snapshot.vibes.len(),
            snapshot.users.len(),
            snapshot.tags.len(),
            snapshot.ratings.len()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    pub async fn snapshot(&self) -> Snapshot {
        let buckets = self.collections.read().await;
        let mut snapshot = Snapshot::default();
        for document in buckets.values().flat_map(|bucket| bucket.values()).cloned() {
            match document {
                Document::Vibe(v) => snapshot.vibes.push(v),
                Document::User(u) => snapshot.users.push(u),
                Document::Tag(t) => snapshot.tags.push(t),
                Document::Rating(r) => snapshot.ratings.push(r),
                Document::Metric(m) => snapshot.search_metrics.push(m),
                Document::Trending(t) => snapshot.trending_searches.push(t),
                Document::History(h) => snapshot.search_history.push(h),
            }
        }
        snapshot
    }

    /// Write the store to `path` atomically
    pub async fn save(&self, path: &Path) -> StoreResult<()> {
        let snapshot = self.snapshot().await;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("json.tmp");
        let lock_path = path.with_extension("lock");
        let lock_file = fs::File::create(&lock_path)?;
        lock_file.lock_exclusive()?;

        let data = serde_json::to_string_pretty(&snapshot)?;
        fs::write(&tmp_path, data)?;
        fs::rename(&tmp_path, path)?;

        lock_file.unlock()?;
        let _ = fs::remove_file(lock_path); // Best effort cleanup

        debug!("Saved snapshot to {}", path.display());
        Ok(())
    }

    /// Make every operation on `collection` fail until restored
    pub async fn set_unavailable(&self, collection: Collection, unavailable: bool) {
        let mut set = self.unavailable.write().await;
        if unavailable {
            set.insert(collection);
        } else {
            set.remove(&collection);
        }
    }

    pub async fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .await
            .get(&collection)
            .map_or(0, BTreeMap::len)
    }

    async fn ensure_available(&self, collection: Collection) -> StoreResult<()> {
        if self.unavailable.read().await.contains(&collection) {
            return Err(StoreError::Unavailable(collection));
        }
        Ok(())
    }
}

/// Equality semantics per index: ids match exactly, usernames ignore case
fn eq_matches(index: Index, document: &Document, value: &str) -> bool {
    match (index, document) {
        (Index::VibesByCreator, Document::Vibe(v)) => v.created_by == value,
        (Index::UsersByUsername, Document::User(u)) => u.username.to_lowercase() == value.to_lowercase(),
        (Index::UsersById, Document::User(u)) => u.id == value,
        (Index::RatingsByVibe, Document::Rating(r)) => r.vibe_id == value,
        (Index::RatingsByUser, Document::Rating(r)) => r.user_id == value,
        (Index::HistoryByUser, Document::History(h)) => h.user_id == value,
        (Index::TrendingByTerm, Document::Trending(t)) => t.term == value,
        _ => false,
    }
}

fn timestamp_key(document: &Document) -> Option<DateTime<Utc>> {
    match document {
        Document::Vibe(v) => Some(v.created_at),
        Document::User(u) => Some(u.created_at),
        Document::Rating(r) => Some(r.created_at),
        Document::Metric(m) => Some(m.timestamp),
        Document::Trending(t) => Some(t.last_updated_at),
        Document::History(h) => Some(h.timestamp),
        Document::Tag(_) => None,
    }
}

/// Index order, ascending
fn index_order(index: Index, a: &Document, b: &Document) -> Ordering {
    let by_id = a.id().cmp(b.id());
    match (index, a, b) {
        (Index::TrendingByCount, Document::Trending(x), Document::Trending(y)) => x
            .count
            .cmp(&y.count)
            .then(x.last_updated_at.cmp(&y.last_updated_at))
            .then(y.term.cmp(&x.term)),
        (Index::VibesByCreatedAt, _, _) | (Index::HistoryByUser, _, _) => {
            timestamp_key(a).cmp(&timestamp_key(b)).then(by_id)
        }
        _ => by_id,
    }
}

#[async_trait]
impl Repository for MemoryStore {
    async fn scan(&self, collection: Collection, limit: usize) -> StoreResult<Vec<Document>> {
        self.ensure_available(collection).await?;
        let buckets = self.collections.read().await;
        Ok(buckets
            .get(&collection)
            .map(|bucket| bucket.values().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn lookup(&self, query: IndexQuery, limit: usize) -> StoreResult<Vec<Document>> {
        let index = query.index();
        let collection = index.collection();
        self.ensure_available(collection).await?;

        let buckets = self.collections.read().await;
        let documents = buckets.get(&collection).map(|bucket| bucket.values());
        let Some(documents) = documents else {
            return Ok(Vec::new());
        };

        let mut selected: Vec<Document> = match &query {
            IndexQuery::Eq { value, .. } => documents
                .filter(|d| eq_matches(index, d, value))
                .cloned()
                .collect(),
            IndexQuery::Range { start, end, .. } => documents
                .filter(|d| {
                    timestamp_key(d).is_some_and(|ts| {
                        start.map_or(true, |s| ts >= s) && end.map_or(true, |e| ts <= e)
                    })
                })
                .cloned()
                .collect(),
            IndexQuery::Ordered { .. } => documents.cloned().collect(),
        };

        match &query {
            // Most recent history first
            IndexQuery::Eq {
                index: Index::HistoryByUser,
                ..
            } => selected.sort_by(|a, b| index_order(index, b, a)),
            IndexQuery::Ordered {
                descending: true, ..
            } => selected.sort_by(|a, b| index_order(index, b, a)),
            _ => selected.sort_by(|a, b| index_order(index, a, b)),
        }
        selected.truncate(limit);
        Ok(selected)
    }

    async fn text_search(
        &self,
        collection: Collection,
        text: &str,
        limit: usize,
    ) -> StoreResult<Vec<Document>> {
        self.ensure_available(collection).await?;
        let needle = text.to_lowercase();
        let buckets = self.collections.read().await;
        Ok(buckets
            .get(&collection)
            .map(|bucket| {
                bucket
                    .values()
                    .filter(|d| {
                        d.searchable_text()
                            .iter()
                            .any(|field| field.to_lowercase().contains(&needle))
                    })
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, document: Document) -> StoreResult<String> {
        let collection = document.collection();
        self.ensure_available(collection).await?;
        let id = document.id().to_string();

        let mut buckets = self.collections.write().await;
        let bucket = buckets.entry(collection).or_default();
        if bucket.contains_key(&id) {
            return Err(StoreError::Duplicate { collection, id });
        }
        bucket.insert(id.clone(), document);
        Ok(id)
    }

    async fn patch(&self, id: &str, document: Document) -> StoreResult<()> {
        let collection = document.collection();
        self.ensure_available(collection).await?;

        let mut buckets = self.collections.write().await;
        match buckets.get_mut(&collection).and_then(|b| b.get_mut(id)) {
            Some(existing) => {
                *existing = document;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                collection,
                id: id.to_string(),
            }),
        }
    }

    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<()> {
        self.ensure_available(collection).await?;
        let mut buckets = self.collections.write().await;
        match buckets.get_mut(&collection).and_then(|b| b.remove(id)) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                collection,
                id: id.to_string(),
            }),
        }
    }
}
