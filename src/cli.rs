//! CLI mode implementation
//!
//! The argument structs double as MCP tool input schemas.

use crate::error::AppError;
use crate::search::filters::{EmojiFilter, ExplicitDateRange, ExplicitFilter, SortOption};
use crate::search::ranking::WeightOverrides;
use crate::search::SearchRequest;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Vibes search CLI
#[derive(Parser)]
#[command(name = "vibes-search")]
#[command(about = "Search, rank and track searches over vibes, users and tags", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output (no short flag to avoid conflicts)
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store snapshot file, overrides the configured one
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Act as this user id; anonymous when absent
    #[arg(long, global = true, env = "VIBES_USER")]
    pub user: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search vibes, users, tags, reviews and actions
    Search(SearchArgs),
    /// Suggestions for a partial query, or recent and trending searches
    Suggest(SuggestArgs),
    /// Most frequent searches
    Trending(TrendingArgs),
    /// Record a search in the current user's history
    TrackSearch(TrackSearchArgs),
    /// Record a click on a search result
    TrackClick(TrackClickArgs),
    /// Record a failed search
    TrackError(TrackErrorArgs),
}

/// Search tool arguments
#[derive(Parser, JsonSchema, Deserialize, Serialize, Clone, Debug, Default)]
pub struct SearchArgs {
    /// Free text; supports "phrases", -exclusions, #tag, @user, rating:>4, date:>2024-01-01
    #[arg(default_value = "")]
    #[serde(default)]
    #[schemars(
        description = "Free text; supports \"phrases\", -exclusions, #tag, @user, rating:>4, date:>2024-01-01"
    )]
    pub query: String,

    /// Only entities carrying any of these tags
    #[arg(short = 't', long, value_delimiter = ',')]
    #[serde(default)]
    #[schemars(description = "Only entities carrying any of these tags")]
    pub tags: Option<Vec<String>>,

    /// Minimum average rating (1-5)
    #[arg(long)]
    #[serde(default, alias = "minRating")]
    #[schemars(description = "Minimum average rating (1-5)")]
    pub min_rating: Option<f64>,

    /// Maximum average rating (1-5)
    #[arg(long)]
    #[serde(default, alias = "maxRating")]
    #[schemars(description = "Maximum average rating (1-5)")]
    pub max_rating: Option<f64>,

    /// Created on or after (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    #[serde(default)]
    #[schemars(description = "Created on or after (YYYY-MM-DD or RFC 3339)")]
    pub after: Option<String>,

    /// Created on or before (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    #[serde(default)]
    #[schemars(description = "Created on or before (YYYY-MM-DD or RFC 3339)")]
    pub before: Option<String>,

    /// Creator user ids
    #[arg(long, value_delimiter = ',')]
    #[serde(default)]
    #[schemars(description = "Creator user ids")]
    pub creators: Option<Vec<String>>,

    /// Ordering: relevance, rating_desc, rating_asc, most_rated, name, recent, oldest
    #[arg(short = 's', long)]
    #[serde(default)]
    #[schemars(
        description = "Ordering: relevance, rating_desc, rating_asc, most_rated, name, recent, oldest"
    )]
    pub sort: Option<SortOption>,

    /// Only vibes rated with one of these emojis
    #[arg(long, value_delimiter = ',')]
    #[serde(default)]
    #[schemars(description = "Only vibes rated with one of these emojis")]
    pub emojis: Option<Vec<String>>,

    /// Minimum value of a matching emoji rating
    #[arg(long)]
    #[serde(default, alias = "minEmojiValue")]
    #[schemars(description = "Minimum value of a matching emoji rating")]
    pub min_emoji_value: Option<u8>,

    /// Page number, starting at 1
    #[arg(short = 'p', long)]
    #[serde(default)]
    #[schemars(description = "Page number, starting at 1")]
    pub page: Option<usize>,

    /// Results per page (default 20, max 50)
    #[arg(short = 'l', long = "limit")]
    #[serde(default, alias = "pageSize", alias = "limit")]
    #[schemars(description = "Results per page (default 20, max 50)")]
    pub page_size: Option<usize>,

    /// Cursor from a previous page's nextCursor
    #[arg(long)]
    #[serde(default)]
    #[schemars(description = "Cursor from a previous page's nextCursor")]
    pub cursor: Option<String>,

    /// Kinds to search: vibes, users, tags, reviews, actions
    #[arg(long, value_delimiter = ',')]
    #[serde(default, alias = "includeTypes")]
    #[schemars(description = "Kinds to search: vibes, users, tags, reviews, actions")]
    pub types: Option<Vec<String>>,

    /// Filter object; the flat filter arguments override its fields
    #[arg(skip)]
    #[serde(default)]
    #[schemars(description = "Filter object; the flat filter arguments override its fields")]
    pub filters: Option<ExplicitFilter>,

    /// Per-call scoring weight overrides
    #[arg(skip)]
    #[serde(default)]
    #[schemars(description = "Per-call scoring weight overrides")]
    pub weights: Option<WeightOverrides>,

    /// Return JSON instead of markdown
    #[arg(long)]
    #[serde(default)]
    #[schemars(description = "Return JSON instead of markdown")]
    pub json: bool,
}

impl SearchArgs {
    pub fn into_request(self) -> Result<SearchRequest, AppError> {
        let mut filter = self.filters.unwrap_or_default();

        if self.tags.is_some() {
            filter.tags = self.tags;
        }
        if self.min_rating.is_some() {
            filter.min_rating = self.min_rating;
        }
        if self.max_rating.is_some() {
            filter.max_rating = self.max_rating;
        }
        if self.creators.is_some() {
            filter.creators = self.creators;
        }
        if self.sort.is_some() {
            filter.sort = self.sort;
        }

        let after = self
            .after
            .as_deref()
            .map(|s| parse_date_arg(s, false))
            .transpose()?;
        let before = self
            .before
            .as_deref()
            .map(|s| parse_date_arg(s, true))
            .transpose()?;
        if after.is_some() || before.is_some() {
            let mut range = filter.date_range.unwrap_or_default();
            range.start = after.or(range.start);
            range.end = before.or(range.end);
            filter.date_range = Some(range);
        }

        if self.emojis.is_some() || self.min_emoji_value.is_some() {
            let mut emoji = filter.emoji_ratings.unwrap_or_else(EmojiFilter::default);
            if self.emojis.is_some() {
                emoji.emojis = self.emojis;
            }
            if self.min_emoji_value.is_some() {
                emoji.min_value = self.min_emoji_value;
            }
            filter.emoji_ratings = Some(emoji);
        }

        let filters = (filter != ExplicitFilter::default()).then_some(filter);

        Ok(SearchRequest {
            query: self.query,
            filters,
            page: self.page,
            page_size: self.page_size,
            cursor: self.cursor,
            include_types: self.types,
            weights: self.weights,
        })
    }
}

/// A calendar day or a full timestamp. A bare day covers the whole day,
/// so an upper bound lands on its last millisecond.
fn parse_date_arg(value: &str, end_of_day: bool) -> Result<DateTime<Utc>, AppError> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }

    let day = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::InvalidInput(format!("Invalid date '{}'", value)))?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN)
    } else {
        NaiveTime::MIN
    };
    Ok(day.and_time(time).and_utc())
}

/// Suggest tool arguments
#[derive(Parser, JsonSchema, Deserialize, Serialize, Clone, Debug, Default)]
pub struct SuggestArgs {
    /// Partial query; leave empty for recent and trending searches
    #[arg(default_value = "")]
    #[serde(default)]
    #[schemars(description = "Partial query; leave empty for recent and trending searches")]
    pub query: String,

    /// Return JSON instead of markdown
    #[arg(long)]
    #[serde(default)]
    #[schemars(description = "Return JSON instead of markdown")]
    pub json: bool,
}

/// Trending tool arguments
#[derive(Parser, JsonSchema, Deserialize, Serialize, Clone, Debug, Default)]
pub struct TrendingArgs {
    /// Number of terms (default 10)
    #[arg(short = 'l', long)]
    #[serde(default)]
    #[schemars(description = "Number of terms (default 10)")]
    pub limit: Option<usize>,

    /// Return JSON instead of markdown
    #[arg(long)]
    #[serde(default)]
    #[schemars(description = "Return JSON instead of markdown")]
    pub json: bool,
}

/// Track-search tool arguments
#[derive(Parser, JsonSchema, Deserialize, Serialize, Clone, Debug)]
pub struct TrackSearchArgs {
    /// The query that was run
    #[schemars(description = "The query that was run")]
    pub query: String,

    /// How many results it returned
    #[arg(short = 'n', long, default_value_t = 0)]
    #[serde(default, alias = "resultCount")]
    #[schemars(description = "How many results it returned")]
    pub result_count: usize,

    /// Ids of results the user opened
    #[arg(long, value_delimiter = ',')]
    #[serde(default, alias = "clickedResultIds")]
    #[schemars(description = "Ids of results the user opened")]
    pub clicked: Option<Vec<String>>,

    /// Free-form category label
    #[arg(long)]
    #[serde(default)]
    #[schemars(description = "Free-form category label")]
    pub category: Option<String>,
}

/// Track-click tool arguments
#[derive(Parser, JsonSchema, Deserialize, Serialize, Clone, Debug)]
pub struct TrackClickArgs {
    /// The query whose result was clicked
    #[schemars(description = "The query whose result was clicked")]
    pub query: String,

    /// Id of the clicked result
    #[arg(long)]
    #[serde(alias = "resultId")]
    #[schemars(description = "Id of the clicked result")]
    pub result_id: String,

    /// Kind of the clicked result (vibe, user, tag, review, action)
    #[arg(long)]
    #[serde(alias = "resultType")]
    #[schemars(description = "Kind of the clicked result (vibe, user, tag, review, action)")]
    pub result_type: String,

    /// 0-based position in the result list
    #[arg(long)]
    #[schemars(description = "0-based position in the result list")]
    pub position: usize,

    /// User to attribute the click to; defaults to the signed-in user
    #[arg(long = "user-id")]
    #[serde(default, alias = "userId")]
    #[schemars(description = "User to attribute the click to; defaults to the signed-in user")]
    pub user_id: Option<String>,
}

/// Track-error tool arguments
#[derive(Parser, JsonSchema, Deserialize, Serialize, Clone, Debug)]
pub struct TrackErrorArgs {
    /// The query that failed
    #[schemars(description = "The query that failed")]
    pub query: String,

    /// Error message
    #[arg(short = 'm', long)]
    #[serde(alias = "error")]
    #[schemars(description = "Error message")]
    pub message: String,

    /// User to attribute the error to; defaults to the signed-in user
    #[arg(long = "user-id")]
    #[serde(default, alias = "userId")]
    #[schemars(description = "User to attribute the error to; defaults to the signed-in user")]
    pub user_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_search_args_from_command_line() {
        let cli = Cli::parse_from([
            "vibes-search",
            "--user",
            "u1",
            "search",
            "rust #programming",
            "--tags",
            "rust,programming",
            "--sort",
            "top-rated",
            "-l",
            "5",
        ]);
        assert_eq!(cli.user.as_deref(), Some("u1"));

        let Some(Commands::Search(args)) = cli.command else {
            panic!("expected search command");
        };
        assert_eq!(args.query, "rust #programming");
        assert_eq!(
            args.tags,
            Some(vec!["rust".to_string(), "programming".to_string()])
        );
        assert_eq!(args.sort, Some(SortOption::RatingDesc));
        assert_eq!(args.page_size, Some(5));
    }

    #[test]
    fn test_search_args_from_json() {
        let args: SearchArgs = serde_json::from_value(serde_json::json!({
            "query": "coffee",
            "pageSize": 3,
            "includeTypes": ["vibes"],
            "filters": { "minRating": 4.0, "sort": "recent" }
        }))
        .unwrap();

        let request = args.into_request().unwrap();
        assert_eq!(request.page_size, Some(3));
        assert_eq!(request.include_types, Some(vec!["vibes".to_string()]));
        let filters = request.filters.unwrap();
        assert_eq!(filters.min_rating, Some(4.0));
        assert_eq!(filters.sort, Some(SortOption::Recent));
    }

    #[test]
    fn test_flat_arguments_override_filter_object() {
        let args = SearchArgs {
            min_rating: Some(2.0),
            after: Some("2024-05-01".into()),
            before: Some("2024-05-31".into()),
            emojis: Some(vec!["🔥".into()]),
            filters: Some(ExplicitFilter {
                min_rating: Some(4.0),
                max_rating: Some(5.0),
                ..Default::default()
            }),
            ..Default::default()
        };

        let filters = args.into_request().unwrap().filters.unwrap();
        assert_eq!(filters.min_rating, Some(2.0));
        assert_eq!(filters.max_rating, Some(5.0));

        let range = filters.date_range.unwrap();
        let end = range.end.unwrap();
        assert_eq!(range.start.unwrap().day(), 1);
        assert_eq!((end.day(), end.hour(), end.minute()), (31, 23, 59));
        assert_eq!(
            filters.emoji_ratings.unwrap().emojis,
            Some(vec!["🔥".to_string()])
        );
    }

    #[test]
    fn test_no_filters_means_none() {
        let request = SearchArgs {
            query: "jazz".into(),
            ..Default::default()
        }
        .into_request()
        .unwrap();
        assert!(request.filters.is_none());
    }

    #[test]
    fn test_bad_date_is_invalid_input() {
        let err = SearchArgs {
            after: Some("last tuesday".into()),
            ..Default::default()
        }
        .into_request()
        .unwrap_err();
        assert_eq!(err.error_code(), "invalid_input");
    }

    #[test]
    fn test_track_click_args() {
        let args: TrackClickArgs = serde_json::from_value(serde_json::json!({
            "query": "jazz",
            "resultId": "v3",
            "resultType": "vibe",
            "position": 0
        }))
        .unwrap();
        assert_eq!(args.result_id, "v3");
        assert_eq!(args.position, 0);
    }
}
