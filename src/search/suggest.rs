//! Search suggestions
//!
//! With a query: the top few vibes, users and tags for it. Without one:
//! the caller's recent searches, trending terms and popular tags.

use super::engine::{SearchEngine, SearchRequest};
use super::entity::{ScoredResult, TagEntity};
use crate::analytics::SearchAnalytics;
use crate::error::AppError;
use crate::store::{EntityKind, Identity, TrendingTerm};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestions {
    pub query: String,
    pub vibes: Vec<ScoredResult>,
    pub users: Vec<ScoredResult>,
    pub tags: Vec<ScoredResult>,
    pub recent_searches: Vec<String>,
    pub trending: Vec<TrendingTerm>,
    pub popular_tags: Vec<TagEntity>,
}

impl Suggestions {
    pub fn is_empty(&self) -> bool {
        self.vibes.is_empty()
            && self.users.is_empty()
            && self.tags.is_empty()
            && self.recent_searches.is_empty()
            && self.trending.is_empty()
            && self.popular_tags.is_empty()
    }
}

pub async fn suggest(
    engine: &SearchEngine,
    analytics: &SearchAnalytics,
    identity: &Identity,
    query: &str,
    now: DateTime<Utc>,
) -> Result<Suggestions, AppError> {
    let limits = &analytics.config().suggestions;
    let query = query.trim();

    if query.is_empty() {
        let (recent, trending, popular_tags) = futures::try_join!(
            analytics.recent_searches(identity, limits.recent),
            analytics.trending(limits.trending),
            engine.popular_tags(limits.tags),
        )?;

        return Ok(Suggestions {
            recent_searches: recent.into_iter().map(|entry| entry.query).collect(),
            trending,
            popular_tags,
            ..Default::default()
        });
    }

    let top = |kind: EntityKind, limit: usize| {
        let request = SearchRequest {
            query: query.to_string(),
            page_size: Some(limit),
            include_types: Some(vec![kind.as_str().to_string()]),
            ..Default::default()
        };
        async move { engine.search(&request, now).await }
    };

    let (vibes, users, tags) = futures::try_join!(
        top(EntityKind::Vibe, limits.vibes),
        top(EntityKind::User, limits.users),
        top(EntityKind::Tag, limits.tags),
    )?;

    Ok(Suggestions {
        query: query.to_string(),
        vibes: vibes.vibes,
        users: users.users,
        tags: tags.tags,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalyticsConfig, SearchConfig};
    use crate::test_support::{now, seeded_store};
    use std::sync::Arc;

    fn services() -> (SearchEngine, SearchAnalytics) {
        let store = seeded_store();
        (
            SearchEngine::new(store.clone(), SearchConfig::default()),
            SearchAnalytics::new(store, AnalyticsConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_query_suggestions_are_per_kind() {
        let (engine, analytics) = services();
        let suggestions = suggest(&engine, &analytics, &Identity::Anonymous, "rust", now())
            .await
            .unwrap();

        assert_eq!(suggestions.vibes.len(), 1);
        assert_eq!(suggestions.users.len(), 1);
        assert_eq!(suggestions.tags.len(), 1);
        assert!(suggestions.trending.is_empty());
    }

    #[tokio::test]
    async fn test_suggestion_limits() {
        let (engine, analytics) = services();
        let suggestions = suggest(&engine, &analytics, &Identity::Anonymous, "#chill", now())
            .await
            .unwrap();
        assert!(suggestions.vibes.len() <= analytics.config().suggestions.vibes);
        assert_eq!(suggestions.tags.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_query_for_signed_in_user() {
        let (engine, analytics) = services();
        let alice = Identity::User("u1".into());
        analytics
            .track_search(&alice, "jazz", 1, None, None, now())
            .await
            .unwrap();

        let suggestions = suggest(&engine, &analytics, &alice, "  ", now()).await.unwrap();
        assert_eq!(suggestions.recent_searches, vec!["jazz"]);
        assert_eq!(suggestions.trending[0].term, "jazz");
        assert_eq!(suggestions.popular_tags.len(), 5);
        assert_eq!(suggestions.popular_tags[0].name, "programming");
        assert!(suggestions.vibes.is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_for_anonymous_caller() {
        let (engine, analytics) = services();
        let suggestions = suggest(&engine, &analytics, &Identity::Anonymous, "", now())
            .await
            .unwrap();
        assert!(suggestions.recent_searches.is_empty());
        assert!(!suggestions.popular_tags.is_empty());
        assert!(!suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_shared_store_between_services() {
        let store = seeded_store();
        let engine = SearchEngine::new(store.clone(), SearchConfig::default());
        let analytics = Arc::new(SearchAnalytics::new(store, AnalyticsConfig::default()));
        let suggestions = suggest(&engine, &analytics, &Identity::Anonymous, "xylophone", now())
            .await
            .unwrap();
        assert!(suggestions.is_empty());
    }
}
