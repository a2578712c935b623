//! MCP tools implementation
//!
//! Every tool runs against one [`ToolContext`]: the search engine, the
//! analytics service and the caller identity over a shared store.

pub mod analytics;
pub mod format;
pub mod search;

use crate::analytics::{AnalyticsEvent, SearchAnalytics};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::search::{SearchEngine, SearchRequest, SearchResponse};
use crate::store::{Identity, IdentityProvider, MemoryStore, StaticIdentity};
use anyhow::Result;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Time limit for a single tool call
pub const TOOL_TIMEOUT_SECS: u64 = 120;

pub struct ToolContext {
    engine: SearchEngine,
    analytics: Arc<SearchAnalytics>,
    identity: Arc<dyn IdentityProvider>,
    store: Arc<MemoryStore>,
    /// Where `flush` saves the store; nothing is saved when unset
    store_path: Option<PathBuf>,
    pending: Mutex<Vec<JoinHandle<()>>>,
    /// Set once anything may have written to the store since the last save
    dirty: AtomicBool,
}

impl ToolContext {
    pub fn new(
        config: &AppConfig,
        store: Arc<MemoryStore>,
        identity: Arc<dyn IdentityProvider>,
        store_path: Option<PathBuf>,
    ) -> Self {
        Self {
            engine: SearchEngine::new(store.clone(), config.search.clone()),
            analytics: Arc::new(SearchAnalytics::new(store.clone(), config.analytics.clone())),
            identity,
            store,
            store_path,
            pending: Mutex::new(Vec::new()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Load the store snapshot and fix the caller identity
    pub fn open(
        config: &AppConfig,
        store_override: Option<PathBuf>,
        user: Option<String>,
    ) -> Result<Self> {
        let path = match store_override {
            Some(path) => path,
            None => config.resolved_store_path()?,
        };
        let store = Arc::new(MemoryStore::load(&path)?);
        let identity = StaticIdentity::new(user.or_else(|| config.default_user.clone()));
        info!("Using store {}", path.display());

        Ok(Self::new(config, store, Arc::new(identity), Some(path)))
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    pub fn analytics(&self) -> &Arc<SearchAnalytics> {
        &self.analytics
    }

    pub async fn identity(&self) -> Identity {
        self.identity.current().await
    }

    /// Note a direct store write so the next `flush` saves it
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Hand an analytics write to the background
    pub async fn dispatch(&self, event: AnalyticsEvent) {
        self.mark_dirty();
        let handle = self.analytics.dispatch(event);
        self.pending.lock().await.push(handle);
    }

    /// Run a search and queue its analytics: one search metric on success
    /// (plus a history entry for signed-in callers), one error metric on
    /// failure. The result never waits on those writes.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, AppError> {
        let identity = self.identity().await;
        let user_id = identity.user_id().map(str::to_string);
        let started = Instant::now();

        let result = self.engine.search(request, Utc::now()).await;

        match &result {
            Ok(response) => {
                let response_time_ms = started.elapsed().as_millis() as u64;
                debug!(
                    "Search '{}' found {} results in {}ms",
                    request.query, response.total_count, response_time_ms
                );
                self.dispatch(AnalyticsEvent::Search {
                    query: request.query.clone(),
                    user_id,
                    result_count: response.total_count,
                    response_time_ms,
                })
                .await;

                if identity.is_authenticated() && !request.query.trim().is_empty() {
                    self.dispatch(AnalyticsEvent::Track {
                        identity,
                        query: request.query.clone(),
                        result_count: response.total_count,
                    })
                    .await;
                }
            }
            Err(e) => self.record_failure(&request.query, e).await,
        }

        result
    }

    /// Queue the error metric for a search that failed before or inside
    /// the engine
    pub async fn record_failure(&self, query: &str, error: &AppError) {
        let identity = self.identity().await;
        self.dispatch(AnalyticsEvent::Error {
            query: query.to_string(),
            message: error.message(),
            user_id: identity.user_id().map(str::to_string),
        })
        .await;
    }

    /// Wait for queued analytics writes, then save the store if anything
    /// was written
    pub async fn flush(&self) -> Result<(), AppError> {
        let pending = std::mem::take(&mut *self.pending.lock().await);
        for handle in pending {
            if let Err(e) = handle.await {
                warn!("Analytics task did not finish: {}", e);
            }
        }

        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(path) = &self.store_path {
            self.store.save(path).await?;
            debug!("Saved store to {}", path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_context {
    use super::*;
    use crate::test_support::seeded_store;

    /// Context over the seeded store, nothing persisted
    pub fn context(user: Option<&str>) -> (ToolContext, Arc<MemoryStore>) {
        let store = seeded_store();
        let identity = Arc::new(StaticIdentity::new(user.map(str::to_string)));
        let ctx = ToolContext::new(&AppConfig::default(), store.clone(), identity, None);
        (ctx, store)
    }
}
