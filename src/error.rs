//! Error types and handling for the vibes search server

use crate::store::{EntityKind, StoreError};
use serde::Serialize;
use std::fmt;

/// Longest raw query accepted by the search surface
pub const MAX_QUERY_LEN: usize = 500;

/// Application error types
#[derive(Debug, Serialize)]
pub enum AppError {
    InvalidInput(String),
    Unauthenticated(String),
    NotFound(String),
    /// A candidate fetch for one entity kind failed; the whole call fails
    CandidateFetchFailed { kind: EntityKind, message: String },
    StoreError(String),
    ConfigError(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::Unauthenticated(msg) => write!(f, "Authentication required: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::CandidateFetchFailed { kind, message } => {
                write!(f, "Fetching {} candidates failed: {}", kind.as_str(), message)
            }
            AppError::StoreError(msg) => write!(f, "Store error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Get the error code for MCP responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Unauthenticated(_) => "unauthenticated",
            AppError::NotFound(_) => "not_found",
            AppError::CandidateFetchFailed { .. } => "candidate_fetch_failed",
            AppError::StoreError(_) => "store_error",
            AppError::ConfigError(_) => "config_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Entity kind whose candidate fetch failed, if that is what happened
    pub fn failed_kind(&self) -> Option<EntityKind> {
        match self {
            AppError::CandidateFetchFailed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn candidate_fetch(kind: EntityKind, err: StoreError) -> Self {
        AppError::CandidateFetchFailed {
            kind,
            message: err.to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => AppError::NotFound(err.to_string()),
            _ => AppError::StoreError(err.to_string()),
        }
    }
}

/// Convert anyhow::Error to AppError
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Convert serde_json::Error to AppError
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

/// Convert std::io::Error to AppError
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::StoreError(err.to_string())
    }
}

/// Search queries may be empty (filter-only browsing) but not unbounded
pub fn validate_query(query: &str) -> Result<(), AppError> {
    if query.chars().count() > MAX_QUERY_LEN {
        return Err(AppError::InvalidInput(format!(
            "Query too long, maximum {} characters",
            MAX_QUERY_LEN
        )));
    }

    Ok(())
}

/// Tracked queries must carry text
pub fn validate_tracked_query(query: &str) -> Result<(), AppError> {
    if query.trim().is_empty() {
        return Err(AppError::InvalidInput("Query cannot be empty".to_string()));
    }
    validate_query(query)
}

/// Normalize text using Unicode NFKC
pub fn normalize_text(text: &str) -> String {
    use unicode_normalization::UnicodeNormalization;
    text.nfkc().collect::<String>().trim().to_string()
}
