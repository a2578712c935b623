//! Searchable entities and scored results

use crate::store::{EntityKind, Rating, Tag, User, Vibe};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmojiRating {
    pub emoji: String,
    pub value: u8,
}

/// A vibe with its rating aggregates
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VibeEntity {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    /// None when the vibe has no ratings
    pub rating_avg: Option<f64>,
    pub rating_count: usize,
    #[serde(skip)]
    pub emoji_ratings: Vec<EmojiRating>,
}

impl VibeEntity {
    pub fn hydrate(vibe: Vibe, ratings: &[Rating]) -> Self {
        let rating_count = ratings.len();
        let rating_avg = (rating_count > 0).then(|| {
            ratings.iter().map(|r| f64::from(r.value)).sum::<f64>() / rating_count as f64
        });

        Self {
            id: vibe.id,
            title: vibe.title,
            description: vibe.description,
            tags: vibe.tags,
            created_by: vibe.created_by,
            created_at: vibe.created_at,
            rating_avg,
            rating_count,
            emoji_ratings: ratings
                .iter()
                .map(|r| EmojiRating {
                    emoji: r.emoji.clone(),
                    value: r.value,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    pub id: String,
    pub username: String,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub vibe_count: usize,
    pub created_at: DateTime<Utc>,
}

impl UserEntity {
    pub fn hydrate(user: User, vibe_count: usize) -> Self {
        Self {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            bio: user.bio,
            vibe_count,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagEntity {
    pub id: String,
    pub name: String,
    pub usage_count: u64,
}

impl From<Tag> for TagEntity {
    fn from(tag: Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
            usage_count: tag.count,
        }
    }
}

/// A rating record viewed as a review
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEntity {
    pub id: String,
    pub text: String,
    pub emoji: String,
    pub value: u8,
    pub vibe_id: String,
    pub reviewer_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<Rating> for ReviewEntity {
    fn from(rating: Rating) -> Self {
        Self {
            id: rating.id,
            text: rating.review.unwrap_or_default(),
            emoji: rating.emoji,
            value: rating.value,
            vibe_id: rating.vibe_id,
            reviewer_id: rating.user_id,
            created_at: rating.created_at,
        }
    }
}

/// Shortcut to an app action, suggested from query keywords
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionEntity {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SearchableEntity {
    Vibe(VibeEntity),
    User(UserEntity),
    Tag(TagEntity),
    Review(ReviewEntity),
    Action(ActionEntity),
}

impl SearchableEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            SearchableEntity::Vibe(_) => EntityKind::Vibe,
            SearchableEntity::User(_) => EntityKind::User,
            SearchableEntity::Tag(_) => EntityKind::Tag,
            SearchableEntity::Review(_) => EntityKind::Review,
            SearchableEntity::Action(_) => EntityKind::Action,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            SearchableEntity::Vibe(v) => &v.id,
            SearchableEntity::User(u) => &u.id,
            SearchableEntity::Tag(t) => &t.id,
            SearchableEntity::Review(r) => &r.id,
            SearchableEntity::Action(a) => &a.id,
        }
    }

    /// Display name used by the `name` sort
    pub fn name(&self) -> &str {
        match self {
            SearchableEntity::Vibe(v) => &v.title,
            SearchableEntity::User(u) => &u.username,
            SearchableEntity::Tag(t) => &t.name,
            SearchableEntity::Review(r) => &r.text,
            SearchableEntity::Action(a) => &a.title,
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        match self {
            SearchableEntity::Vibe(v) => Some(v.created_at),
            SearchableEntity::User(u) => Some(u.created_at),
            SearchableEntity::Review(r) => Some(r.created_at),
            SearchableEntity::Tag(_) | SearchableEntity::Action(_) => None,
        }
    }

    /// Average rating for vibes, own value for reviews
    pub fn rating(&self) -> Option<f64> {
        match self {
            SearchableEntity::Vibe(v) => v.rating_avg,
            SearchableEntity::Review(r) => Some(f64::from(r.value)),
            _ => None,
        }
    }

    pub fn rating_count(&self) -> Option<usize> {
        match self {
            SearchableEntity::Vibe(v) => Some(v.rating_count),
            _ => None,
        }
    }
}

/// An entity with its relevance score. Lists of these carry no implied
/// order; the engine sorts them explicitly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredResult {
    #[serde(flatten)]
    pub entity: SearchableEntity,
    pub score: f64,
}

impl ScoredResult {
    pub fn new(entity: SearchableEntity, score: f64) -> Self {
        Self {
            entity,
            score: score.max(0.0),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.entity.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rating(value: u8, emoji: &str) -> Rating {
        Rating {
            id: format!("r{}", value),
            vibe_id: "v1".into(),
            user_id: "u1".into(),
            value,
            emoji: emoji.into(),
            review: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn vibe() -> Vibe {
        Vibe {
            id: "v1".into(),
            title: "Sunset".into(),
            description: "orange sky".into(),
            tags: vec!["nature".into()],
            created_by: "u1".into(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_vibe_hydration_aggregates() {
        let entity = VibeEntity::hydrate(vibe(), &[rating(5, "🔥"), rating(2, "😐")]);
        assert_eq!(entity.rating_count, 2);
        assert_eq!(entity.rating_avg, Some(3.5));
        assert_eq!(entity.emoji_ratings.len(), 2);

        let unrated = VibeEntity::hydrate(vibe(), &[]);
        assert_eq!(unrated.rating_avg, None);
        assert_eq!(unrated.rating_count, 0);
    }

    #[test]
    fn test_scored_result_serializes_flat() {
        let result = ScoredResult::new(
            SearchableEntity::Tag(TagEntity {
                id: "t1".into(),
                name: "rust".into(),
                usage_count: 3,
            }),
            1.5,
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "tag");
        assert_eq!(json["name"], "rust");
        assert_eq!(json["score"], 1.5);
    }

    #[test]
    fn test_score_is_never_negative() {
        let result = ScoredResult::new(
            SearchableEntity::Tag(TagEntity {
                id: "t1".into(),
                name: "rust".into(),
                usage_count: 0,
            }),
            -3.0,
        );
        assert_eq!(result.score, 0.0);
    }
}
