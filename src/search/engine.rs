//! Search Engine
//!
//! Runs one search as a single pipeline: parse the query, merge filters,
//! fetch a bounded candidate set per entity kind, drop candidates that fail
//! the text and structural filters, score the survivors, sort, count and
//! paginate.
//!
//! Per-kind fetches are read-only and run concurrently; results are merged
//! only after every kind has completed. A store failure for any kind fails
//! the whole call with [`AppError::CandidateFetchFailed`] naming that kind,
//! so an empty kind in a successful response always means "no matches".
//!
//! Candidate sets are capped per kind (`*_scan_cap` in [`SearchConfig`]).
//! Items beyond the cap are never considered: this trades recall on large
//! collections for bounded latency.

use super::actions::suggest_actions;
use super::entity::{
    ReviewEntity, ScoredResult, SearchableEntity, TagEntity, UserEntity, VibeEntity,
};
use super::filters::{merge_filters, CreatorFilter, EffectiveFilter, ExplicitFilter, ParsedFilter};
use super::filters::SortOption;
use super::fuzzy::fuzzy_match;
use super::pagination::{clamp_page_size, fingerprint, PageInfo, PageWindow};
use super::parser::{ParsedQuery, QueryParser};
use super::ranking::{RelevanceScorer, WeightOverrides};
use crate::config::SearchConfig;
use crate::error::{normalize_text, validate_query, AppError};
use crate::store::{
    Collection, Document, EntityKind, Index, IndexQuery, Rating, Repository, StoreResult, Vibe,
};
use aho_corasick::AhoCorasick;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Score given to everything when browsing by filters alone
const NEUTRAL_SCORE: f64 = 1.0;

/// How candidates are fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStrategy {
    /// Use a secondary or text index when one filter clearly selects the
    /// candidates, else a capped scan
    #[default]
    Indexed,
    /// Always a capped scan
    FullScan,
}

/// A search call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub filters: Option<ExplicitFilter>,
    /// 1-based
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default, alias = "limit")]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub cursor: Option<String>,
    /// Entity kinds to search, e.g. `["vibes", "users"]`
    #[serde(default)]
    pub include_types: Option<Vec<String>>,
    /// Per-call scoring weight overrides
    #[serde(default)]
    pub weights: Option<WeightOverrides>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// Result counts per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub vibes: usize,
    pub users: usize,
    pub tags: usize,
    pub reviews: usize,
    pub actions: usize,
}

impl KindCounts {
    pub fn get(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Vibe => self.vibes,
            EntityKind::User => self.users,
            EntityKind::Tag => self.tags,
            EntityKind::Review => self.reviews,
            EntityKind::Action => self.actions,
        }
    }

    fn increment(&mut self, kind: EntityKind) {
        match kind {
            EntityKind::Vibe => self.vibes += 1,
            EntityKind::User => self.users += 1,
            EntityKind::Tag => self.tags += 1,
            EntityKind::Review => self.reviews += 1,
            EntityKind::Action => self.actions += 1,
        }
    }
}

/// One page of merged, ranked results. Counts cover every match, not just
/// this page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub vibes: Vec<ScoredResult>,
    pub users: Vec<ScoredResult>,
    pub tags: Vec<ScoredResult>,
    pub actions: Vec<ScoredResult>,
    pub reviews: Vec<ScoredResult>,
    pub total_count: usize,
    pub total_counts: KindCounts,
    #[serde(flatten)]
    pub pagination: PageInfo,
}

impl SearchResponse {
    fn from_page(page: Vec<ScoredResult>, counts: KindCounts, pagination: PageInfo) -> Self {
        let mut response = Self {
            vibes: Vec::new(),
            users: Vec::new(),
            tags: Vec::new(),
            actions: Vec::new(),
            reviews: Vec::new(),
            total_count: counts.vibes + counts.users + counts.tags + counts.reviews + counts.actions,
            total_counts: counts,
            pagination,
        };
        for result in page {
            match result.kind() {
                EntityKind::Vibe => response.vibes.push(result),
                EntityKind::User => response.users.push(result),
                EntityKind::Tag => response.tags.push(result),
                EntityKind::Review => response.reviews.push(result),
                EntityKind::Action => response.actions.push(result),
            }
        }
        response
    }

    pub fn results(&self, kind: EntityKind) -> &[ScoredResult] {
        match kind {
            EntityKind::Vibe => &self.vibes,
            EntityKind::User => &self.users,
            EntityKind::Tag => &self.tags,
            EntityKind::Review => &self.reviews,
            EntityKind::Action => &self.actions,
        }
    }

    /// Results on this page, kind by kind
    pub fn iter(&self) -> impl Iterator<Item = &ScoredResult> {
        EntityKind::ALL
            .into_iter()
            .flat_map(move |kind| self.results(kind).iter())
    }

    pub fn page_len(&self) -> usize {
        self.iter().count()
    }
}

/// Per-call state shared by the per-kind fetches
struct SearchContext<'a> {
    parsed: &'a ParsedQuery,
    filter: &'a EffectiveFilter,
    matcher: &'a TextMatcher,
    scorer: &'a RelevanceScorer,
    scoring_text: String,
    text_mode: bool,
    now: DateTime<Utc>,
}

/// Search orchestrator over a [`Repository`]
pub struct SearchEngine {
    repo: Arc<dyn Repository>,
    config: SearchConfig,
    scorer: RelevanceScorer,
}

impl SearchEngine {
    pub fn new(repo: Arc<dyn Repository>, config: SearchConfig) -> Self {
        let scorer = RelevanceScorer::new(config.weights.clone());
        Self {
            repo,
            config,
            scorer,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run a search. `now` feeds the recency signal.
    pub async fn search(
        &self,
        request: &SearchRequest,
        now: DateTime<Utc>,
    ) -> Result<SearchResponse, AppError> {
        validate_query(&request.query)?;
        let query = normalize_text(&request.query);
        let parsed = QueryParser::parse(&query);

        let explicit = request.filters.clone().unwrap_or_default();
        let mut filter = merge_filters(&ParsedFilter::from(&parsed), &explicit);
        let kinds = resolve_kinds(request.include_types.as_deref())?;

        let page_size = clamp_page_size(
            request.page_size,
            self.config.default_page_size,
            self.config.max_page_size,
        );
        let fp = fingerprint(&(&query, &filter, &kinds));
        let window = PageWindow::resolve(request.page, page_size, request.cursor.as_deref(), &fp)?;

        let text_mode = parsed.has_text();
        if !text_mode && !filter.is_active() {
            debug!("Empty query without filters, returning empty result");
            return Ok(SearchResponse::from_page(
                Vec::new(),
                KindCounts::default(),
                window.info(0, &fp),
            ));
        }

        if let Some(CreatorFilter::Username(name)) = &filter.creator {
            let ids = self.resolve_user(name).await?;
            debug!("Resolved @{} to {} user id(s)", name, ids.len());
            filter = filter.with_creator_ids(ids);
        }

        // Browsing without text only covers kinds some filter constrains
        let searched: Vec<EntityKind> = kinds
            .iter()
            .copied()
            .filter(|kind| text_mode || filter.applies_to(*kind))
            .collect();

        let scorer = match &request.weights {
            Some(overrides) => {
                RelevanceScorer::new(self.scorer.weights().with_overrides(overrides))
            }
            None => self.scorer.clone(),
        };
        let matcher = TextMatcher::new(&parsed, self.config.fuzzy_threshold)?;
        let ctx = SearchContext {
            parsed: &parsed,
            filter: &filter,
            matcher: &matcher,
            scorer: &scorer,
            scoring_text: parsed.scoring_text(),
            text_mode,
            now,
        };

        debug!(
            "Searching {:?} for '{}' (text: {}, filters: {})",
            searched,
            query,
            text_mode,
            filter.is_active()
        );

        let fetches = searched
            .iter()
            .filter(|kind| kind.collection().is_some())
            .map(|&kind| self.search_kind(kind, &ctx));
        let mut results: Vec<ScoredResult> = try_join_all(fetches).await?.into_iter().flatten().collect();

        if searched.contains(&EntityKind::Action) {
            results.extend(
                suggest_actions(&parsed, self.config.fuzzy_threshold, scorer.weights().exact_match)
                    .into_iter()
                    .map(|(action, score)| ScoredResult::new(SearchableEntity::Action(action), score)),
            );
        }

        let sort = filter.sort;
        results.sort_by(|a, b| compare_results(a, b, sort));

        let mut counts = KindCounts::default();
        for result in &results {
            counts.increment(result.kind());
        }

        // A single kind pages within itself; several kinds page the merged
        // sequence and are split back by kind afterwards
        let page = window.slice(&results);
        debug!(
            "Search matched {} results, returning {} from offset {}",
            results.len(),
            page.len(),
            window.offset
        );

        Ok(SearchResponse::from_page(
            page,
            counts,
            window.info(results.len(), &fp),
        ))
    }

    /// Most used tags among the first `tag_scan_cap` tags
    pub async fn popular_tags(&self, limit: usize) -> Result<Vec<TagEntity>, AppError> {
        let docs = self
            .repo
            .scan(Collection::Tags, self.config.tag_scan_cap)
            .await
            .map_err(|e| AppError::candidate_fetch(EntityKind::Tag, e))?;

        let mut tags: Vec<TagEntity> = docs
            .into_iter()
            .filter_map(Document::into_tag)
            .map(TagEntity::from)
            .collect();
        tags.sort_by(|a, b| b.usage_count.cmp(&a.usage_count).then_with(|| a.name.cmp(&b.name)));
        tags.truncate(limit);
        Ok(tags)
    }

    /// Fetch, filter and score one kind
    async fn search_kind(
        &self,
        kind: EntityKind,
        ctx: &SearchContext<'_>,
    ) -> Result<Vec<ScoredResult>, AppError> {
        let constrained_by_creator = matches!(
            kind,
            EntityKind::Vibe | EntityKind::User | EntityKind::Review
        );
        if constrained_by_creator && ctx.filter.creator_ids().is_some_and(|ids| ids.is_empty()) {
            debug!("{}: creator filter selects nobody", kind);
            return Ok(Vec::new());
        }

        let candidates = self
            .fetch_candidates(kind, ctx)
            .await
            .map_err(|e| AppError::candidate_fetch(kind, e))?;
        let fetched = candidates.len();

        let text_matched: Vec<Document> = candidates
            .into_iter()
            .filter(|doc| ctx.matcher.accepts(&doc.searchable_text()))
            .collect();
        let after_text = text_matched.len();

        let entities = self
            .hydrate(kind, text_matched)
            .await
            .map_err(|e| AppError::candidate_fetch(kind, e))?;

        let results: Vec<ScoredResult> = entities
            .into_iter()
            .filter(|entity| ctx.filter.matches(entity))
            .map(|entity| {
                let score = self.score(&entity, ctx);
                ScoredResult::new(entity, score)
            })
            .collect();

        debug!(
            "{}: {} candidates, {} after text match, {} after filters",
            kind,
            fetched,
            after_text,
            results.len()
        );
        Ok(results)
    }

    async fn fetch_candidates(
        &self,
        kind: EntityKind,
        ctx: &SearchContext<'_>,
    ) -> StoreResult<Vec<Document>> {
        let Some(collection) = kind.collection() else {
            return Ok(Vec::new());
        };
        let cap = self.scan_cap(kind);

        if self.config.scan_strategy == ScanStrategy::Indexed {
            if let Some(query) = index_plan(kind, ctx.filter) {
                debug!("{}: index lookup {:?}", kind, query);
                return self.repo.lookup(query, cap).await;
            }
            if let Some(phrase) = ctx.parsed.exact_phrases.first() {
                debug!("{}: text index lookup for \"{}\"", kind, phrase);
                return self.repo.text_search(collection, phrase, cap).await;
            }
        }

        self.repo.scan(collection, cap).await
    }

    fn scan_cap(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Vibe => self.config.vibe_scan_cap,
            EntityKind::User => self.config.user_scan_cap,
            EntityKind::Tag => self.config.tag_scan_cap,
            EntityKind::Review => self.config.review_scan_cap,
            EntityKind::Action => 0,
        }
    }

    /// Attach aggregates: rating stats to vibes, vibe counts to users
    async fn hydrate(
        &self,
        kind: EntityKind,
        documents: Vec<Document>,
    ) -> StoreResult<Vec<SearchableEntity>> {
        match kind {
            EntityKind::Vibe => {
                let vibes: Vec<Vibe> = documents.into_iter().filter_map(Document::into_vibe).collect();
                let ratings = try_join_all(vibes.iter().map(|vibe| {
                    self.repo.lookup(
                        IndexQuery::eq(Index::RatingsByVibe, vibe.id.as_str()),
                        self.config.review_scan_cap,
                    )
                }))
                .await?;

                Ok(vibes
                    .into_iter()
                    .zip(ratings)
                    .map(|(vibe, docs)| {
                        let ratings: Vec<Rating> =
                            docs.into_iter().filter_map(Document::into_rating).collect();
                        SearchableEntity::Vibe(VibeEntity::hydrate(vibe, &ratings))
                    })
                    .collect())
            }
            EntityKind::User => {
                let users: Vec<_> = documents.into_iter().filter_map(Document::into_user).collect();
                let vibe_counts = try_join_all(users.iter().map(|user| {
                    self.repo.lookup(
                        IndexQuery::eq(Index::VibesByCreator, user.id.as_str()),
                        self.config.vibe_scan_cap,
                    )
                }))
                .await?;

                Ok(users
                    .into_iter()
                    .zip(vibe_counts)
                    .map(|(user, vibes)| SearchableEntity::User(UserEntity::hydrate(user, vibes.len())))
                    .collect())
            }
            EntityKind::Tag => Ok(documents
                .into_iter()
                .filter_map(Document::into_tag)
                .map(|tag| SearchableEntity::Tag(TagEntity::from(tag)))
                .collect()),
            EntityKind::Review => Ok(documents
                .into_iter()
                .filter_map(Document::into_rating)
                .map(|rating| SearchableEntity::Review(ReviewEntity::from(rating)))
                .collect()),
            EntityKind::Action => Ok(Vec::new()),
        }
    }

    fn score(&self, entity: &SearchableEntity, ctx: &SearchContext<'_>) -> f64 {
        if !ctx.text_mode {
            return NEUTRAL_SCORE;
        }
        let text = ctx.scoring_text.as_str();
        match entity {
            SearchableEntity::Vibe(v) => ctx.scorer.score_vibe(v, text, ctx.now),
            SearchableEntity::User(u) => ctx.scorer.score_user(u, text),
            SearchableEntity::Tag(t) => ctx.scorer.score_tag(t, text),
            SearchableEntity::Review(r) => ctx.scorer.score_review(r, text),
            SearchableEntity::Action(_) => NEUTRAL_SCORE,
        }
    }

    /// Ids of users whose username or id is `name`
    async fn resolve_user(&self, name: &str) -> Result<Vec<String>, AppError> {
        let fetch = |index| async move {
            self.repo
                .lookup(IndexQuery::eq(index, name), self.config.user_scan_cap)
                .await
                .map_err(|e| AppError::candidate_fetch(EntityKind::User, e))
        };

        let mut ids: Vec<String> = fetch(Index::UsersByUsername)
            .await?
            .iter()
            .map(|doc| doc.id().to_string())
            .collect();
        if ids.is_empty() {
            ids = fetch(Index::UsersById)
                .await?
                .iter()
                .map(|doc| doc.id().to_string())
                .collect();
        }
        Ok(ids)
    }
}

/// Requested kinds, deduplicated in canonical order; defaults when absent
fn resolve_kinds(include_types: Option<&[String]>) -> Result<Vec<EntityKind>, AppError> {
    let mut kinds: Vec<EntityKind> = match include_types {
        Some(types) if !types.is_empty() => types
            .iter()
            .map(|t| t.parse::<EntityKind>().map_err(AppError::InvalidInput))
            .collect::<Result<_, _>>()?,
        _ => EntityKind::DEFAULT.to_vec(),
    };
    kinds.sort();
    kinds.dedup();
    Ok(kinds)
}

/// Index lookup that selects a kind's candidates, when one filter clearly does
fn index_plan(kind: EntityKind, filter: &EffectiveFilter) -> Option<IndexQuery> {
    let single_creator = filter
        .creator_ids()
        .filter(|ids| ids.len() == 1)
        .map(|ids| ids[0].clone());

    match kind {
        EntityKind::Vibe => match (single_creator, filter.date) {
            (Some(id), _) => Some(IndexQuery::eq(Index::VibesByCreator, id)),
            (None, Some(range)) => Some(IndexQuery::Range {
                index: Index::VibesByCreatedAt,
                start: range.after,
                end: range.before,
            }),
            (None, None) => None,
        },
        EntityKind::User => single_creator.map(|id| IndexQuery::eq(Index::UsersById, id)),
        EntityKind::Review => single_creator.map(|id| IndexQuery::eq(Index::RatingsByUser, id)),
        EntityKind::Tag | EntityKind::Action => None,
    }
}

/// Ordering for `sort`; ties fall back to score, then kind, then id
fn compare_results(a: &ScoredResult, b: &ScoredResult, sort: SortOption) -> Ordering {
    let primary = match sort {
        SortOption::Relevance => Ordering::Equal,
        SortOption::RatingDesc => {
            missing_last(a.entity.rating(), b.entity.rating(), |x, y| y.total_cmp(x))
        }
        SortOption::RatingAsc => {
            missing_last(a.entity.rating(), b.entity.rating(), |x, y| x.total_cmp(y))
        }
        SortOption::MostRated => {
            missing_last(a.entity.rating_count(), b.entity.rating_count(), |x, y| y.cmp(x))
        }
        SortOption::Name => a
            .entity
            .name()
            .to_lowercase()
            .cmp(&b.entity.name().to_lowercase()),
        SortOption::Recent => {
            missing_last(a.entity.created_at(), b.entity.created_at(), |x, y| y.cmp(x))
        }
        SortOption::Oldest => {
            missing_last(a.entity.created_at(), b.entity.created_at(), |x, y| x.cmp(y))
        }
    };

    primary
        .then_with(|| b.score.total_cmp(&a.score))
        .then_with(|| a.kind().cmp(&b.kind()))
        .then_with(|| a.entity.id().cmp(b.entity.id()))
}

fn missing_last<T>(a: Option<T>, b: Option<T>, cmp: impl Fn(&T, &T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => cmp(&x, &y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Text-level acceptance: exclusions, exact phrases, fuzzy terms
struct TextMatcher {
    excluded: Option<AhoCorasick>,
    phrases: Option<(AhoCorasick, usize)>,
    terms: String,
    raw_query: String,
    threshold: f64,
}

impl TextMatcher {
    fn new(parsed: &ParsedQuery, threshold: f64) -> Result<Self, AppError> {
        Ok(Self {
            excluded: build_automaton(&parsed.excluded_terms)?.map(|(ac, _)| ac),
            phrases: build_automaton(&parsed.exact_phrases)?,
            terms: parsed.joined_terms(),
            raw_query: parsed.original_query.trim().to_lowercase(),
            threshold,
        })
    }

    fn accepts(&self, fields: &[&str]) -> bool {
        let lowered: Vec<String> = fields.iter().map(|f| f.to_lowercase()).collect();

        if let Some(excluded) = &self.excluded {
            if lowered.iter().any(|field| excluded.is_match(field)) {
                return false;
            }
        }

        // Every phrase must occur literally in some field
        if let Some((phrases, count)) = &self.phrases {
            let found: HashSet<usize> = lowered
                .iter()
                .flat_map(|field| phrases.find_overlapping_iter(field))
                .map(|m| m.pattern().as_usize())
                .collect();
            return found.len() == *count;
        }

        if self.terms.is_empty() {
            return true;
        }

        // Raw containment catches queries like "C++" that tokenize poorly
        fields
            .iter()
            .any(|field| fuzzy_match(field, &self.terms, self.threshold))
            || lowered.iter().any(|field| field.contains(&self.raw_query))
    }
}

/// Case-folded automaton over `patterns`, with its distinct pattern count
fn build_automaton(patterns: &[String]) -> Result<Option<(AhoCorasick, usize)>, AppError> {
    let mut lowered: Vec<String> = patterns.iter().map(|p| p.to_lowercase()).collect();
    lowered.sort();
    lowered.dedup();
    if lowered.is_empty() {
        return Ok(None);
    }

    let count = lowered.len();
    AhoCorasick::new(&lowered)
        .map(|ac| Some((ac, count)))
        .map_err(|e| AppError::InvalidInput(format!("Unusable search terms: {}", e)))
}
