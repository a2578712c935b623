//! Search analytics
//!
//! Records search, click and error metrics, keeps per-user search history
//! and maintains the capped trending-terms collection.
//!
//! Every search emits exactly one `search` metric, every click exactly one
//! `click` metric and every caught failure exactly one `error` metric.
//! Reporting built on top of the metrics relies on that.

use crate::config::AnalyticsConfig;
use crate::error::{validate_tracked_query, AppError};
use crate::store::{
    Document, Identity, Index, IndexQuery, MetricKind, Repository, SearchHistoryEntry,
    SearchMetric, StoreResult, TrendingTerm,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// History rows examined when looking for a row to coalesce into
const HISTORY_LOOKBACK: usize = 50;

/// Grouping key of a query: lowercased and trimmed
pub fn normalize_term(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Optional fields of a metric
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricDetails {
    pub user_id: Option<String>,
    pub result_count: Option<usize>,
    pub response_time_ms: Option<u64>,
    pub clicked_result_id: Option<String>,
    pub clicked_result_kind: Option<String>,
    pub click_position: Option<usize>,
    pub error_message: Option<String>,
}

/// What a `track_search` call did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackOutcome {
    pub history_id: String,
    /// True when an existing history row was updated instead of inserted
    pub coalesced: bool,
    pub term: String,
    pub trending_count: u64,
}

/// Analytics writes dispatched in the background
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyticsEvent {
    Search {
        query: String,
        user_id: Option<String>,
        result_count: usize,
        response_time_ms: u64,
    },
    Click {
        query: String,
        result_id: String,
        result_kind: String,
        position: usize,
        user_id: Option<String>,
    },
    Error {
        query: String,
        message: String,
        user_id: Option<String>,
    },
    Track {
        identity: Identity,
        query: String,
        result_count: usize,
    },
}

pub struct SearchAnalytics {
    repo: Arc<dyn Repository>,
    config: AnalyticsConfig,
}

impl SearchAnalytics {
    pub fn new(repo: Arc<dyn Repository>, config: AnalyticsConfig) -> Self {
        Self { repo, config }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Record that the caller ran `query`.
    ///
    /// A repeat of the same normalized query by the same user inside the
    /// coalescing window updates the previous history row in place. The
    /// trending count goes up on every call either way.
    pub async fn track_search(
        &self,
        identity: &Identity,
        query: &str,
        result_count: usize,
        clicked_result_ids: Option<Vec<String>>,
        category: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TrackOutcome, AppError> {
        let user_id = identity.user_id().ok_or_else(|| {
            AppError::Unauthenticated("Tracking searches requires a signed-in user".to_string())
        })?;
        validate_tracked_query(query)?;
        let term = normalize_term(query);

        let (history_id, coalesced) = self
            .upsert_history(user_id, &term, result_count, clicked_result_ids, now)
            .await?;
        let trending_count = self.increment_trending(&term, category, now).await?;

        // Cap maintenance is eventually consistent and never fails the call
        match self.enforce_trending_cap().await {
            Ok(0) => {}
            Ok(evicted) => debug!("Evicted {} trending terms", evicted),
            Err(e) => warn!("Trending cap maintenance failed: {}", e),
        }

        Ok(TrackOutcome {
            history_id,
            coalesced,
            term,
            trending_count,
        })
    }

    async fn upsert_history(
        &self,
        user_id: &str,
        term: &str,
        result_count: usize,
        clicked_result_ids: Option<Vec<String>>,
        now: DateTime<Utc>,
    ) -> StoreResult<(String, bool)> {
        let window = self.config.coalesce_window();
        let recent = self
            .repo
            .lookup(IndexQuery::eq(Index::HistoryByUser, user_id), HISTORY_LOOKBACK)
            .await?;

        let previous = recent
            .into_iter()
            .filter_map(Document::into_history)
            .find(|entry| entry.query == term && now - entry.timestamp <= window);

        match previous {
            Some(entry) => {
                let id = entry.id.clone();
                let updated = SearchHistoryEntry {
                    result_count,
                    timestamp: now,
                    clicked_result_ids: clicked_result_ids.or(entry.clicked_result_ids),
                    ..entry
                };
                self.repo.patch(&id, Document::History(updated)).await?;
                debug!("Coalesced search '{}' into history row {}", term, id);
                Ok((id, true))
            }
            None => {
                let entry = SearchHistoryEntry {
                    id: Uuid::new_v4().to_string(),
                    user_id: user_id.to_string(),
                    query: term.to_string(),
                    timestamp: now,
                    result_count,
                    clicked_result_ids,
                };
                let id = self.repo.insert(Document::History(entry)).await?;
                Ok((id, false))
            }
        }
    }

    async fn increment_trending(
        &self,
        term: &str,
        category: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let existing = self
            .repo
            .lookup(IndexQuery::eq(Index::TrendingByTerm, term), 1)
            .await?
            .into_iter()
            .find_map(Document::into_trending);

        match existing {
            Some(trending) => {
                let count = trending.count + 1;
                let updated = TrendingTerm {
                    count,
                    last_updated_at: now,
                    category: category.or(trending.category),
                    term: trending.term,
                };
                self.repo.patch(term, Document::Trending(updated)).await?;
                Ok(count)
            }
            None => {
                let created = TrendingTerm {
                    term: term.to_string(),
                    count: 1,
                    last_updated_at: now,
                    category,
                };
                self.repo.insert(Document::Trending(created)).await?;
                Ok(1)
            }
        }
    }

    /// Evict the lowest-count terms past the cap; returns how many went
    pub async fn enforce_trending_cap(&self) -> StoreResult<usize> {
        let ascending = self
            .repo
            .lookup(
                IndexQuery::Ordered {
                    index: Index::TrendingByCount,
                    descending: false,
                },
                usize::MAX,
            )
            .await?;

        let overflow = ascending.len().saturating_sub(self.config.trending_cap);
        for doc in ascending.iter().take(overflow) {
            self.repo.delete(doc.collection(), doc.id()).await?;
        }
        Ok(overflow)
    }

    /// Top trending terms, highest count first
    pub async fn trending(&self, limit: usize) -> Result<Vec<TrendingTerm>, AppError> {
        let docs = self
            .repo
            .lookup(
                IndexQuery::Ordered {
                    index: Index::TrendingByCount,
                    descending: true,
                },
                limit,
            )
            .await?;
        Ok(docs.into_iter().filter_map(Document::into_trending).collect())
    }

    /// The caller's most recent distinct searches; empty for anonymous callers
    pub async fn recent_searches(
        &self,
        identity: &Identity,
        limit: usize,
    ) -> Result<Vec<SearchHistoryEntry>, AppError> {
        let Some(user_id) = identity.user_id() else {
            return Ok(Vec::new());
        };

        let docs = self
            .repo
            .lookup(IndexQuery::eq(Index::HistoryByUser, user_id), HISTORY_LOOKBACK)
            .await?;

        let mut recent: Vec<SearchHistoryEntry> = Vec::new();
        for entry in docs.into_iter().filter_map(Document::into_history) {
            if recent.len() >= limit {
                break;
            }
            if !recent.iter().any(|seen| seen.query == entry.query) {
                recent.push(entry);
            }
        }
        Ok(recent)
    }

    /// Append one metric; metrics are never updated afterwards
    pub async fn record_metric(
        &self,
        kind: MetricKind,
        query: &str,
        details: MetricDetails,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let metric = SearchMetric {
            id: Uuid::new_v4().to_string(),
            timestamp: now,
            kind,
            query: query.to_string(),
            user_id: details.user_id,
            result_count: details.result_count,
            response_time_ms: details.response_time_ms,
            clicked_result_id: details.clicked_result_id,
            clicked_result_kind: details.clicked_result_kind,
            click_position: details.click_position,
            error_message: details.error_message,
        };
        Ok(self.repo.insert(Document::Metric(metric)).await?)
    }

    pub async fn track_click(
        &self,
        query: &str,
        result_id: &str,
        result_kind: &str,
        position: usize,
        user_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let details = MetricDetails {
            user_id,
            clicked_result_id: Some(result_id.to_string()),
            clicked_result_kind: Some(result_kind.to_string()),
            click_position: Some(position),
            ..Default::default()
        };
        self.record_metric(MetricKind::Click, query, details, now).await
    }

    pub async fn track_error(
        &self,
        query: &str,
        message: &str,
        user_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let details = MetricDetails {
            user_id,
            error_message: Some(message.to_string()),
            ..Default::default()
        };
        self.record_metric(MetricKind::Error, query, details, now).await
    }

    async fn apply(&self, event: AnalyticsEvent, now: DateTime<Utc>) -> Result<(), AppError> {
        match event {
            AnalyticsEvent::Search {
                query,
                user_id,
                result_count,
                response_time_ms,
            } => {
                let details = MetricDetails {
                    user_id,
                    result_count: Some(result_count),
                    response_time_ms: Some(response_time_ms),
                    ..Default::default()
                };
                self.record_metric(MetricKind::Search, &query, details, now)
                    .await?;
            }
            AnalyticsEvent::Click {
                query,
                result_id,
                result_kind,
                position,
                user_id,
            } => {
                self.track_click(&query, &result_id, &result_kind, position, user_id, now)
                    .await?;
            }
            AnalyticsEvent::Error {
                query,
                message,
                user_id,
            } => {
                self.track_error(&query, &message, user_id, now).await?;
            }
            AnalyticsEvent::Track {
                identity,
                query,
                result_count,
            } => {
                self.track_search(&identity, &query, result_count, None, None, now)
                    .await?;
            }
        }
        Ok(())
    }

    /// Apply `event` in a background task. Failures are logged and dropped;
    /// the returned handle only exists so callers can wait in tests.
    pub fn dispatch(self: &Arc<Self>, event: AnalyticsEvent) -> JoinHandle<()> {
        let analytics = Arc::clone(self);
        let now = Utc::now();
        tokio::spawn(async move {
            if let Err(e) = analytics.apply(event, now).await {
                warn!("Analytics write failed: {}", e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Collection, MemoryStore};
    use crate::test_support::now;
    use chrono::Duration;

    fn analytics(store: Arc<MemoryStore>, config: AnalyticsConfig) -> Arc<SearchAnalytics> {
        Arc::new(SearchAnalytics::new(store, config))
    }

    fn alice() -> Identity {
        Identity::User("u1".to_string())
    }

    async fn trending_count(analytics: &SearchAnalytics, term: &str) -> u64 {
        analytics
            .trending(100)
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.term == term)
            .map(|t| t.count)
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_repeat_inside_window_coalesces() {
        let store = Arc::new(MemoryStore::new());
        let analytics = analytics(store.clone(), AnalyticsConfig::default());

        let first = analytics
            .track_search(&alice(), "Rust Tips ", 3, None, None, now())
            .await
            .unwrap();
        let second = analytics
            .track_search(&alice(), "rust tips", 7, None, None, now() + Duration::minutes(2))
            .await
            .unwrap();

        assert!(!first.coalesced);
        assert!(second.coalesced);
        assert_eq!(first.history_id, second.history_id);
        assert_eq!(store.len(Collection::SearchHistory).await, 1);
        assert_eq!(trending_count(&analytics, "rust tips").await, 2);

        let recent = analytics.recent_searches(&alice(), 5).await.unwrap();
        assert_eq!(recent[0].result_count, 7);
        assert_eq!(recent[0].timestamp, now() + Duration::minutes(2));
    }

    #[tokio::test]
    async fn test_repeat_outside_window_inserts() {
        let store = Arc::new(MemoryStore::new());
        let analytics = analytics(store.clone(), AnalyticsConfig::default());

        analytics
            .track_search(&alice(), "jazz", 1, None, None, now())
            .await
            .unwrap();
        analytics
            .track_search(&alice(), "jazz", 1, None, None, now() + Duration::minutes(6))
            .await
            .unwrap();

        assert_eq!(store.len(Collection::SearchHistory).await, 2);
        assert_eq!(trending_count(&analytics, "jazz").await, 2);
        // distinct queries only
        assert_eq!(analytics.recent_searches(&alice(), 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_other_users_do_not_coalesce() {
        let store = Arc::new(MemoryStore::new());
        let analytics = analytics(store.clone(), AnalyticsConfig::default());

        analytics
            .track_search(&alice(), "jazz", 1, None, None, now())
            .await
            .unwrap();
        analytics
            .track_search(&Identity::User("u2".into()), "jazz", 1, None, None, now())
            .await
            .unwrap();

        assert_eq!(store.len(Collection::SearchHistory).await, 2);
    }

    #[tokio::test]
    async fn test_anonymous_tracking_fails_closed() {
        let store = Arc::new(MemoryStore::new());
        let analytics = analytics(store.clone(), AnalyticsConfig::default());

        let err = analytics
            .track_search(&Identity::Anonymous, "jazz", 1, None, None, now())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "unauthenticated");
        assert_eq!(store.len(Collection::SearchHistory).await, 0);
        assert_eq!(store.len(Collection::TrendingTerms).await, 0);
        assert!(analytics.recent_searches(&Identity::Anonymous, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let analytics = analytics(Arc::new(MemoryStore::new()), AnalyticsConfig::default());
        let err = analytics
            .track_search(&alice(), "   ", 0, None, None, now())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_input");
    }

    #[tokio::test]
    async fn test_trending_cap_evicts_lowest_counts() {
        let store = Arc::new(MemoryStore::new());
        let analytics = analytics(
            store.clone(),
            AnalyticsConfig {
                trending_cap: 3,
                ..Default::default()
            },
        );

        let mut at = now();
        for (term, times) in [("delta", 5), ("alpha", 4), ("beta", 3), ("gamma", 2)] {
            for _ in 0..times {
                at += Duration::minutes(10);
                analytics
                    .track_search(&alice(), term, 1, None, None, at)
                    .await
                    .unwrap();
                assert!(store.len(Collection::TrendingTerms).await <= 3);
            }
        }
        for i in 0..10 {
            at += Duration::minutes(10);
            analytics
                .track_search(&alice(), &format!("one-off {}", i), 1, None, None, at)
                .await
                .unwrap();
            assert!(store.len(Collection::TrendingTerms).await <= 3);
        }

        let terms: Vec<String> = analytics
            .trending(10)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.term)
            .collect();
        assert_eq!(terms.len(), 3);
        assert_eq!(terms[0], "delta");
        assert_eq!(terms[1], "alpha");
        assert!(!terms.contains(&"gamma".to_string()));
    }

    #[tokio::test]
    async fn test_category_is_kept() {
        let analytics = analytics(Arc::new(MemoryStore::new()), AnalyticsConfig::default());
        analytics
            .track_search(&alice(), "jazz", 1, None, Some("music".into()), now())
            .await
            .unwrap();
        analytics
            .track_search(&alice(), "jazz", 1, None, None, now())
            .await
            .unwrap();

        let trending = analytics.trending(1).await.unwrap();
        assert_eq!(trending[0].category.as_deref(), Some("music"));
    }

    #[tokio::test]
    async fn test_each_event_emits_one_metric() {
        let store = Arc::new(MemoryStore::new());
        let analytics = analytics(store.clone(), AnalyticsConfig::default());

        analytics
            .track_click("jazz", "v3", "vibes", 2, Some("u1".into()), now())
            .await
            .unwrap();
        analytics
            .track_error("jazz", "boom", None, now())
            .await
            .unwrap();
        analytics
            .dispatch(AnalyticsEvent::Search {
                query: "jazz".into(),
                user_id: None,
                result_count: 4,
                response_time_ms: 12,
            })
            .await
            .unwrap();

        let metrics: Vec<SearchMetric> = store
            .snapshot()
            .await
            .search_metrics;
        assert_eq!(metrics.len(), 3);

        let click = metrics.iter().find(|m| m.kind == MetricKind::Click).unwrap();
        assert_eq!(click.clicked_result_id.as_deref(), Some("v3"));
        assert_eq!(click.click_position, Some(2));

        let error = metrics.iter().find(|m| m.kind == MetricKind::Error).unwrap();
        assert_eq!(error.error_message.as_deref(), Some("boom"));

        let search = metrics.iter().find(|m| m.kind == MetricKind::Search).unwrap();
        assert_eq!(search.result_count, Some(4));
        assert_eq!(search.response_time_ms, Some(12));
    }

    #[tokio::test]
    async fn test_dispatch_swallows_failures() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(Collection::SearchMetrics, true).await;
        let analytics = analytics(store.clone(), AnalyticsConfig::default());

        let handle = analytics.dispatch(AnalyticsEvent::Error {
            query: "jazz".into(),
            message: "boom".into(),
            user_id: None,
        });
        assert!(handle.await.is_ok());

        let handle = analytics.dispatch(AnalyticsEvent::Track {
            identity: Identity::Anonymous,
            query: "jazz".into(),
            result_count: 0,
        });
        assert!(handle.await.is_ok());
        assert_eq!(store.len(Collection::TrendingTerms).await, 0);
    }
}
