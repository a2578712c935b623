//! Ranking & Scoring System
//!
//! Multi-signal relevance scoring with configurable weights. Text signals
//! come from [`fuzzy_score`]; popularity, quality and recency signals are
//! saturating ratios so no single signal can dominate unboundedly.
//!
//! Scoring takes `now` as an argument instead of reading the clock, so the
//! same inputs always produce bit-identical scores.

use super::entity::{ReviewEntity, TagEntity, UserEntity, VibeEntity};
use super::fuzzy::fuzzy_score;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Rating count at which the vibe popularity signal saturates
const VIBE_POPULARITY_SATURATION: f64 = 50.0;
/// Vibe count at which the user popularity signal saturates
const USER_POPULARITY_SATURATION: f64 = 20.0;
/// Usage count at which the tag popularity signal saturates
const TAG_POPULARITY_SATURATION: f64 = 100.0;
const MAX_RATING: f64 = 5.0;
const RECENCY_HORIZON_DAYS: f64 = 365.0;
const BIO_WEIGHT_FACTOR: f64 = 0.5;

/// Scoring weights for the different relevance signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringWeights {
    /// Flat bonus when a username or tag name equals the query
    pub exact_match: f64,
    /// Multiplier applied to every text signal
    pub fuzzy_match: f64,
    /// Vibe title, and user full name
    pub title_match: f64,
    /// Vibe description and review text; user bios get half of it
    pub description_match: f64,
    /// Best-matching vibe tag, tag names and review emoji
    pub tag_match: f64,
    pub username_match: f64,
    pub popularity: f64,
    pub recency: f64,
    pub rating: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            exact_match: 10.0,
            fuzzy_match: 1.0,
            title_match: 3.0,
            description_match: 1.5,
            tag_match: 2.0,
            username_match: 3.0,
            popularity: 1.0,
            recency: 0.5,
            rating: 1.0,
        }
    }
}

/// Per-call partial override of [`ScoringWeights`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeightOverrides {
    pub exact_match: Option<f64>,
    pub fuzzy_match: Option<f64>,
    pub title_match: Option<f64>,
    pub description_match: Option<f64>,
    pub tag_match: Option<f64>,
    pub username_match: Option<f64>,
    pub popularity: Option<f64>,
    pub recency: Option<f64>,
    pub rating: Option<f64>,
}

impl ScoringWeights {
    /// New weight table with `overrides` applied; `self` is left untouched
    pub fn with_overrides(&self, overrides: &WeightOverrides) -> Self {
        Self {
            exact_match: overrides.exact_match.unwrap_or(self.exact_match),
            fuzzy_match: overrides.fuzzy_match.unwrap_or(self.fuzzy_match),
            title_match: overrides.title_match.unwrap_or(self.title_match),
            description_match: overrides
                .description_match
                .unwrap_or(self.description_match),
            tag_match: overrides.tag_match.unwrap_or(self.tag_match),
            username_match: overrides.username_match.unwrap_or(self.username_match),
            popularity: overrides.popularity.unwrap_or(self.popularity),
            recency: overrides.recency.unwrap_or(self.recency),
            rating: overrides.rating.unwrap_or(self.rating),
        }
    }
}

/// Per-kind relevance scorer
#[derive(Debug, Clone, Default)]
pub struct RelevanceScorer {
    weights: ScoringWeights,
}

impl RelevanceScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn score_vibe(&self, vibe: &VibeEntity, query: &str, now: DateTime<Utc>) -> f64 {
        let w = &self.weights;

        let best_tag = vibe
            .tags
            .iter()
            .map(|tag| fuzzy_score(tag, query))
            .fold(0.0, f64::max);
        let text = w.title_match * unit(fuzzy_score(&vibe.title, query))
            + w.description_match * unit(fuzzy_score(&vibe.description, query))
            + w.tag_match * unit(best_tag);

        let popularity = saturate(vibe.rating_count as f64, VIBE_POPULARITY_SATURATION);
        let quality = vibe.rating_avg.unwrap_or(0.0).clamp(0.0, MAX_RATING) / MAX_RATING;

        w.fuzzy_match * text
            + w.popularity * popularity
            + w.rating * quality
            + w.recency * recency(vibe.created_at, now)
    }

    pub fn score_user(&self, user: &UserEntity, query: &str) -> f64 {
        let w = &self.weights;

        let mut text = w.username_match * unit(fuzzy_score(&user.username, query));
        if let Some(full_name) = &user.full_name {
            text += w.title_match * unit(fuzzy_score(full_name, query));
        }
        if let Some(bio) = &user.bio {
            text += w.description_match * BIO_WEIGHT_FACTOR * unit(fuzzy_score(bio, query));
        }

        let exact = if equals_ignore_case(&user.username, query.trim_start_matches('@')) {
            w.exact_match
        } else {
            0.0
        };

        w.fuzzy_match * text
            + exact
            + w.popularity * saturate(user.vibe_count as f64, USER_POPULARITY_SATURATION)
    }

    pub fn score_tag(&self, tag: &TagEntity, query: &str) -> f64 {
        let w = &self.weights;

        let text = w.tag_match * unit(fuzzy_score(&tag.name, query));
        let exact = if equals_ignore_case(&tag.name, query.trim_start_matches('#')) {
            w.exact_match
        } else {
            0.0
        };

        w.fuzzy_match * text
            + exact
            + w.popularity * saturate(tag.usage_count as f64, TAG_POPULARITY_SATURATION)
    }

    pub fn score_review(&self, review: &ReviewEntity, query: &str) -> f64 {
        let w = &self.weights;

        let text = w.description_match * unit(fuzzy_score(&review.text, query))
            + w.tag_match * unit(fuzzy_score(&review.emoji, query));
        let quality = f64::from(review.value).clamp(0.0, MAX_RATING) / MAX_RATING;

        w.fuzzy_match * text + w.rating * quality
    }
}

/// Fuzzy score (0-100) to a 0-1 factor
fn unit(score: f64) -> f64 {
    score / 100.0
}

fn saturate(value: f64, at: f64) -> f64 {
    (value / at).clamp(0.0, 1.0)
}

/// 1 for brand-new items, decaying linearly to 0 after a year
fn recency(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_days = (now - created_at).num_seconds() as f64 / 86_400.0;
    (1.0 - age_days / RECENCY_HORIZON_DAYS).clamp(0.0, 1.0)
}

fn equals_ignore_case(a: &str, b: &str) -> bool {
    !b.is_empty() && a.to_lowercase() == b.to_lowercase()
}
