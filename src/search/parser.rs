//! Query Parser
//!
//! Turns a raw query string into plain terms, quoted exact phrases,
//! excluded terms and structured filters. Parsing is total: operator
//! syntax that does not parse is kept as an ordinary term.
//!
//! Recognized syntax:
//! - `"exact phrase"`
//! - `@user`
//! - `#tag` (repeatable, accumulates)
//! - `rating:>4`, `rating:<3`, `rating:5`, `rating:3-5`
//! - `date:>2024-01-01`, `date:<2024-06-30`, `date:2024-03-15`
//! - `-word` excludes `word`

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static USER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@([\w.\-]+)$").expect("valid user regex"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#([\w\-]+)$").expect("valid tag regex"));
static RATING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^rating:(>=|<=|>|<)?(\d+(?:\.\d+)?)(?:-(\d+(?:\.\d+)?))?$")
        .expect("valid rating regex")
});
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^date:(>=|<=|>|<)?(\d{4}-\d{2}-\d{2})$").expect("valid date regex")
});

/// Inclusive rating bounds on the 0-5 scale
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RatingRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl RatingRange {
    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Inclusive creation-time bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.after.map_or(true, |after| ts >= after)
            && self.before.map_or(true, |before| ts <= before)
    }

    pub fn is_unbounded(&self) -> bool {
        self.after.is_none() && self.before.is_none()
    }
}

/// Parsed and processed search query
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedQuery {
    /// Original unmodified query
    pub original_query: String,
    /// Plain words, in query order
    pub terms: Vec<String>,
    /// Quoted phrases that must appear verbatim (case-insensitive)
    pub exact_phrases: Vec<String>,
    /// Words prefixed with `-`, sign stripped
    pub excluded_terms: Vec<String>,
    /// `#tag` filters, lowercased, deduplicated
    pub tag_filters: Vec<String>,
    pub user_filter: Option<String>,
    pub rating_range: Option<RatingRange>,
    pub date_range: Option<DateRange>,
}

impl ParsedQuery {
    /// Whether the query carries any positive text to match
    pub fn has_text(&self) -> bool {
        !self.terms.is_empty() || !self.exact_phrases.is_empty()
    }

    /// Plain terms joined back into one string
    pub fn joined_terms(&self) -> String {
        self.terms.join(" ")
    }

    /// Text used for relevance scoring: terms followed by phrases
    pub fn scoring_text(&self) -> String {
        self.terms
            .iter()
            .chain(self.exact_phrases.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn has_filters(&self) -> bool {
        !self.tag_filters.is_empty()
            || self.user_filter.is_some()
            || self.rating_range.is_some()
            || self.date_range.is_some()
    }
}

/// Query parser
pub struct QueryParser;

impl QueryParser {
    /// Parse a search query into its components
    pub fn parse(query: &str) -> ParsedQuery {
        let mut parsed = ParsedQuery {
            original_query: query.to_string(),
            ..Default::default()
        };

        let (phrases, remaining) = Self::extract_quoted_phrases(query);
        for phrase in phrases {
            push_unique(&mut parsed.exact_phrases, phrase);
        }

        for token in remaining.split_whitespace() {
            Self::classify_token(token, &mut parsed);
        }

        parsed
    }

    /// Extract double-quoted phrases.
    /// Returns (quoted_phrases, query_with_quotes_removed)
    fn extract_quoted_phrases(query: &str) -> (Vec<String>, String) {
        let mut phrases = Vec::new();
        let mut remaining = String::new();
        let mut chars = query.chars().peekable();

        while let Some(&ch) = chars.peek() {
            if ch == '"' {
                chars.next(); // consume opening quote

                let mut phrase = String::new();
                let mut found_closing = false;

                while let Some(&ch) = chars.peek() {
                    if ch == '"' {
                        chars.next(); // consume closing quote
                        found_closing = true;
                        break;
                    } else if ch == '\\' {
                        // Handle escaped quotes
                        chars.next();
                        if let Some(&next_ch) = chars.peek() {
                            phrase.push(next_ch);
                            chars.next();
                        }
                    } else {
                        phrase.push(ch);
                        chars.next();
                    }
                }

                let trimmed = phrase.trim();
                if found_closing && !trimmed.is_empty() {
                    phrases.push(trimmed.to_string());
                    // Keep neighbouring tokens apart
                    remaining.push(' ');
                } else if !found_closing {
                    // Unclosed quote - treat the rest as plain words
                    remaining.push(' ');
                    remaining.push_str(&phrase);
                }
            } else {
                remaining.push(ch);
                chars.next();
            }
        }

        (phrases, remaining)
    }

    fn classify_token(token: &str, parsed: &mut ParsedQuery) {
        if let Some(caps) = USER_RE.captures(token) {
            parsed.user_filter = Some(caps[1].to_string());
            return;
        }

        if let Some(caps) = TAG_RE.captures(token) {
            push_unique(&mut parsed.tag_filters, caps[1].to_lowercase());
            return;
        }

        if let Some(range) = Self::parse_rating(token) {
            parsed.rating_range = Some(range);
            return;
        }

        if let Some(range) = Self::parse_date(token) {
            parsed.date_range = Some(range);
            return;
        }

        match token.strip_prefix('-') {
            Some(rest) if !rest.is_empty() => push_unique(&mut parsed.excluded_terms, rest.to_string()),
            _ => parsed.terms.push(token.to_string()),
        }
    }

    fn parse_rating(token: &str) -> Option<RatingRange> {
        let caps = RATING_RE.captures(token)?;
        let op = caps.get(1).map(|m| m.as_str());
        let value: f64 = caps[2].parse().ok()?;
        let upper: Option<f64> = match caps.get(3) {
            Some(m) => Some(m.as_str().parse().ok()?),
            None => None,
        };

        match (op, upper) {
            (Some(_), Some(_)) => None,
            (Some(">") | Some(">="), None) => Some(RatingRange {
                min: Some(value),
                max: None,
            }),
            (Some("<") | Some("<="), None) => Some(RatingRange {
                min: None,
                max: Some(value),
            }),
            (None, Some(upper)) => Some(RatingRange {
                min: Some(value.min(upper)),
                max: Some(value.max(upper)),
            }),
            _ => Some(RatingRange {
                min: Some(value),
                max: Some(value),
            }),
        }
    }

    fn parse_date(token: &str) -> Option<DateRange> {
        let caps = DATE_RE.captures(token)?;
        let op = caps.get(1).map(|m| m.as_str());
        let day = NaiveDate::parse_from_str(&caps[2], "%Y-%m-%d").ok()?;

        let start = day.and_time(NaiveTime::MIN).and_utc();
        let end = day
            .and_hms_milli_opt(23, 59, 59, 999)
            .map(|dt| dt.and_utc())?;

        Some(match op {
            Some(">") | Some(">=") => DateRange {
                after: Some(start),
                before: None,
            },
            Some("<") | Some("<=") => DateRange {
                after: None,
                before: Some(end),
            },
            _ => DateRange {
                after: Some(start),
                before: Some(end),
            },
        })
    }
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_basic_parsing() {
        let parsed = QueryParser::parse("hello world");
        assert_eq!(parsed.original_query, "hello world");
        assert_eq!(parsed.terms, vec!["hello", "world"]);
        assert!(parsed.exact_phrases.is_empty());
        assert!(parsed.excluded_terms.is_empty());
    }

    #[test]
    fn test_quoted_phrase_only() {
        let parsed = QueryParser::parse(r#""love coding""#);
        assert_eq!(parsed.exact_phrases, vec!["love coding"]);
        assert!(parsed.terms.is_empty());
        assert!(parsed.excluded_terms.is_empty());
    }

    #[test]
    fn test_excluded_terms_keep_case() {
        let parsed = QueryParser::parse("love -TypeScript");
        assert_eq!(parsed.terms, vec!["love"]);
        assert_eq!(parsed.excluded_terms, vec!["TypeScript"]);
    }

    #[test]
    fn test_operators() {
        let parsed = QueryParser::parse("#funny @alice rating:>4");
        assert_eq!(parsed.tag_filters, vec!["funny"]);
        assert_eq!(parsed.user_filter.as_deref(), Some("alice"));
        assert_eq!(
            parsed.rating_range,
            Some(RatingRange {
                min: Some(4.0),
                max: None
            })
        );
        assert!(parsed.terms.is_empty());
    }

    #[test]
    fn test_rating_forms() {
        let lt = QueryParser::parse("rating:<3").rating_range.unwrap();
        assert_eq!((lt.min, lt.max), (None, Some(3.0)));

        let exact = QueryParser::parse("rating:5").rating_range.unwrap();
        assert_eq!((exact.min, exact.max), (Some(5.0), Some(5.0)));

        let range = QueryParser::parse("rating:2-4").rating_range.unwrap();
        assert_eq!((range.min, range.max), (Some(2.0), Some(4.0)));

        let reversed = QueryParser::parse("rating:4-2").rating_range.unwrap();
        assert_eq!((reversed.min, reversed.max), (Some(2.0), Some(4.0)));
    }

    #[test]
    fn test_malformed_operators_become_terms() {
        let parsed = QueryParser::parse("rating:abc date:yesterday date:2024-13-45 rating:>3-4");
        assert_eq!(
            parsed.terms,
            vec!["rating:abc", "date:yesterday", "date:2024-13-45", "rating:>3-4"]
        );
        assert!(parsed.rating_range.is_none());
        assert!(parsed.date_range.is_none());
    }

    #[test]
    fn test_date_forms() {
        let after = QueryParser::parse("date:>2024-01-15").date_range.unwrap();
        assert_eq!(after.after, Some(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()));
        assert!(after.before.is_none());

        let day = QueryParser::parse("date:2024-03-01").date_range.unwrap();
        assert!(day.contains(Utc.with_ymd_and_hms(2024, 3, 1, 23, 0, 0).unwrap()));
        assert!(!day.contains(Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_scalar_filters_last_write_wins_tags_accumulate() {
        let parsed = QueryParser::parse("@alice @bob #a #b #a rating:1 rating:>3");
        assert_eq!(parsed.user_filter.as_deref(), Some("bob"));
        assert_eq!(parsed.tag_filters, vec!["a", "b"]);
        assert_eq!(parsed.rating_range.unwrap().min, Some(3.0));
    }

    #[test]
    fn test_lone_signs_are_terms() {
        let parsed = QueryParser::parse("- @ # c++");
        assert_eq!(parsed.terms, vec!["-", "@", "#", "c++"]);
        assert!(parsed.excluded_terms.is_empty());
    }

    #[test]
    fn test_escaped_quotes() {
        let parsed = QueryParser::parse(r#""quote with \" inside""#);
        assert_eq!(parsed.exact_phrases, vec![r#"quote with " inside"#]);
    }

    #[test]
    fn test_unclosed_quote() {
        let parsed = QueryParser::parse(r#"hello "unclosed world"#);
        assert_eq!(parsed.terms, vec!["hello", "unclosed", "world"]);
        assert!(parsed.exact_phrases.is_empty());
    }

    #[test]
    fn test_phrase_separates_neighbours() {
        let parsed = QueryParser::parse(r#"foo"bar baz"qux"#);
        assert_eq!(parsed.exact_phrases, vec!["bar baz"]);
        assert_eq!(parsed.terms, vec!["foo", "qux"]);
    }

    #[test]
    fn test_empty_query() {
        let parsed = QueryParser::parse("");
        assert_eq!(parsed.original_query, "");
        assert!(!parsed.has_text());
        assert!(!parsed.has_filters());
    }

    #[test]
    fn test_every_token_lands_in_exactly_one_bucket() {
        let parsed = QueryParser::parse(r#"rust "async io" -java tokio -go"#);
        assert_eq!(parsed.terms, vec!["rust", "tokio"]);
        assert_eq!(parsed.exact_phrases, vec!["async io"]);
        assert_eq!(parsed.excluded_terms, vec!["java", "go"]);
        assert_eq!(parsed.scoring_text(), "rust tokio async io");
    }
}
