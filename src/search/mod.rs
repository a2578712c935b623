//! Search and relevance
//!
//! Free-text queries are parsed into terms, phrases and inline filters,
//! matched against stored entities (typo tolerant), scored per entity kind
//! and returned as one ranked, paginated response.

pub mod actions;
pub mod engine;
pub mod entity;
pub mod filters;
pub mod fuzzy;
pub mod pagination;
pub mod parser;
pub mod ranking;
pub mod suggest;

pub use engine::{ScanStrategy, SearchEngine, SearchRequest, SearchResponse};
pub use entity::{ScoredResult, SearchableEntity};
pub use filters::{ExplicitFilter, SortOption};
pub use parser::{ParsedQuery, QueryParser};
pub use ranking::{RelevanceScorer, ScoringWeights, WeightOverrides};
pub use suggest::{suggest, Suggestions};
