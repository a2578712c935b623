//! Search filters
//!
//! Filters reach the engine from two places: operators inside the query
//! text ([`ParsedFilter`]) and the request's filter object
//! ([`ExplicitFilter`]). [`merge_filters`] folds the two into an
//! [`EffectiveFilter`]; the explicit side wins field by field and the
//! parsed side fills the gaps.

use super::entity::SearchableEntity;
use super::parser::{DateRange, ParsedQuery, RatingRange};
use crate::store::EntityKind;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Result ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOption {
    #[default]
    Relevance,
    #[serde(alias = "top_rated")]
    RatingDesc,
    RatingAsc,
    MostRated,
    Name,
    Recent,
    Oldest,
}

impl SortOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOption::Relevance => "relevance",
            SortOption::RatingDesc => "rating_desc",
            SortOption::RatingAsc => "rating_asc",
            SortOption::MostRated => "most_rated",
            SortOption::Name => "name",
            SortOption::Recent => "recent",
            SortOption::Oldest => "oldest",
        }
    }
}

impl fmt::Display for SortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "relevance" => Ok(SortOption::Relevance),
            "rating_desc" | "top_rated" => Ok(SortOption::RatingDesc),
            "rating_asc" => Ok(SortOption::RatingAsc),
            "most_rated" => Ok(SortOption::MostRated),
            "name" => Ok(SortOption::Name),
            "recent" => Ok(SortOption::Recent),
            "oldest" => Ok(SortOption::Oldest),
            other => Err(format!("Unknown sort option '{}'", other)),
        }
    }
}

/// Emoji-rating filter: a rating with one of `emojis` (any emoji when
/// empty) whose value is at least `min_value`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmojiFilter {
    #[serde(default)]
    pub emojis: Option<Vec<String>>,
    #[serde(default)]
    pub min_value: Option<u8>,
}

impl EmojiFilter {
    fn accepts(&self, emoji: &str, value: u8) -> bool {
        let emoji_ok = match &self.emojis {
            Some(emojis) if !emojis.is_empty() => emojis.iter().any(|e| e == emoji),
            _ => true,
        };
        emoji_ok && self.min_value.map_or(true, |min| value >= min)
    }

    fn is_empty(&self) -> bool {
        self.emojis.as_ref().map_or(true, Vec::is_empty) && self.min_value.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExplicitDateRange {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

/// Filter object supplied alongside the query
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExplicitFilter {
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub min_rating: Option<f64>,
    #[serde(default)]
    pub max_rating: Option<f64>,
    #[serde(default)]
    pub date_range: Option<ExplicitDateRange>,
    /// Creator user ids
    #[serde(default)]
    pub creators: Option<Vec<String>>,
    #[serde(default)]
    pub sort: Option<SortOption>,
    #[serde(default)]
    pub emoji_ratings: Option<EmojiFilter>,
}

/// Filters carried by operators in the query text
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedFilter {
    pub tags: Vec<String>,
    pub user: Option<String>,
    pub rating: Option<RatingRange>,
    pub date: Option<DateRange>,
}

impl From<&ParsedQuery> for ParsedFilter {
    fn from(query: &ParsedQuery) -> Self {
        Self {
            tags: query.tag_filters.clone(),
            user: query.user_filter.clone(),
            rating: query.rating_range,
            date: query.date_range,
        }
    }
}

/// Who created an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "by", content = "value", rename_all = "camelCase")]
pub enum CreatorFilter {
    /// User ids, from the request
    Ids(Vec<String>),
    /// `@user` from the query; an id or a username, resolved before use
    Username(String),
}

/// The filter a search actually runs with
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveFilter {
    pub tags: Vec<String>,
    pub creator: Option<CreatorFilter>,
    pub rating: Option<RatingRange>,
    pub date: Option<DateRange>,
    pub emoji: Option<EmojiFilter>,
    pub sort: SortOption,
}

/// Merge explicit and parsed filters. Pure: neither input is modified.
pub fn merge_filters(parsed: &ParsedFilter, explicit: &ExplicitFilter) -> EffectiveFilter {
    let tags = match &explicit.tags {
        Some(tags) if !tags.is_empty() => normalize_tags(tags),
        _ => parsed.tags.clone(),
    };

    let creator = match &explicit.creators {
        Some(ids) if !ids.is_empty() => Some(CreatorFilter::Ids(ids.clone())),
        _ => parsed.user.clone().map(CreatorFilter::Username),
    };

    let parsed_rating = parsed.rating.unwrap_or_default();
    let rating = RatingRange {
        min: explicit.min_rating.or(parsed_rating.min),
        max: explicit.max_rating.or(parsed_rating.max),
    };

    let parsed_date = parsed.date.unwrap_or_default();
    let explicit_date = explicit.date_range.clone().unwrap_or_default();
    let date = DateRange {
        after: explicit_date.start.or(parsed_date.after),
        before: explicit_date.end.or(parsed_date.before),
    };

    EffectiveFilter {
        tags,
        creator,
        rating: (!rating.is_unbounded()).then_some(rating),
        date: (!date.is_unbounded()).then_some(date),
        emoji: explicit.emoji_ratings.clone().filter(|e| !e.is_empty()),
        sort: explicit.sort.unwrap_or_default(),
    }
}

fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().trim_start_matches('#').to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

impl EffectiveFilter {
    /// Whether any structural filter is set
    pub fn is_active(&self) -> bool {
        !self.tags.is_empty()
            || self.creator.is_some()
            || self.rating.is_some()
            || self.date.is_some()
            || self.emoji.is_some()
    }

    /// Whether at least one active filter constrains `kind`
    pub fn applies_to(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Vibe => self.is_active(),
            EntityKind::Review => {
                self.creator.is_some()
                    || self.rating.is_some()
                    || self.date.is_some()
                    || self.emoji.is_some()
            }
            EntityKind::User => self.creator.is_some(),
            EntityKind::Tag => !self.tags.is_empty(),
            EntityKind::Action => false,
        }
    }

    /// Creator ids once `@user` has been resolved
    pub fn creator_ids(&self) -> Option<&[String]> {
        match &self.creator {
            Some(CreatorFilter::Ids(ids)) => Some(ids.as_slice()),
            _ => None,
        }
    }

    /// Copy of this filter with the creator replaced by resolved ids
    pub fn with_creator_ids(&self, ids: Vec<String>) -> Self {
        Self {
            creator: Some(CreatorFilter::Ids(ids)),
            ..self.clone()
        }
    }

    /// Check the filters that apply to the entity's kind; the rest are
    /// ignored. An entity with no rating fails any rating bound.
    pub fn matches(&self, entity: &SearchableEntity) -> bool {
        match entity {
            SearchableEntity::Vibe(v) => {
                self.tags_match(&v.tags)
                    && self.creator_matches(&v.created_by)
                    && self.date.map_or(true, |d| d.contains(v.created_at))
                    && self.rating_matches(v.rating_avg)
                    && self.emoji.as_ref().map_or(true, |f| {
                        v.emoji_ratings.iter().any(|r| f.accepts(&r.emoji, r.value))
                    })
            }
            SearchableEntity::Review(r) => {
                self.creator_matches(&r.reviewer_id)
                    && self.date.map_or(true, |d| d.contains(r.created_at))
                    && self.rating_matches(Some(f64::from(r.value)))
                    && self.emoji.as_ref().map_or(true, |f| f.accepts(&r.emoji, r.value))
            }
            SearchableEntity::User(u) => match &self.creator {
                None => true,
                Some(CreatorFilter::Ids(ids)) => ids.contains(&u.id),
                Some(CreatorFilter::Username(name)) => {
                    u.id == *name || u.username.eq_ignore_ascii_case(name)
                }
            },
            SearchableEntity::Tag(t) => {
                self.tags.is_empty() || self.tags.contains(&t.name.to_lowercase())
            }
            SearchableEntity::Action(_) => true,
        }
    }

    fn tags_match(&self, tags: &[String]) -> bool {
        self.tags.is_empty()
            || tags
                .iter()
                .any(|tag| self.tags.contains(&tag.to_lowercase()))
    }

    fn creator_matches(&self, user_id: &str) -> bool {
        match &self.creator {
            None => true,
            Some(CreatorFilter::Ids(ids)) => ids.iter().any(|id| id == user_id),
            // Unresolved usernames only match ids verbatim
            Some(CreatorFilter::Username(name)) => name == user_id,
        }
    }

    fn rating_matches(&self, rating: Option<f64>) -> bool {
        match (self.rating, rating) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(range), Some(value)) => range.contains(value),
        }
    }
}
