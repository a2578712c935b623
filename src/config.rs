//! Application configuration
//!
//! A single JSON file, every field optional. A missing file means defaults.

use crate::search::engine::ScanStrategy;
use crate::search::ranking::ScoringWeights;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "vibes-search";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_page_size: usize,
    /// Server-side cap, applied whatever the client asks for
    pub max_page_size: usize,
    pub vibe_scan_cap: usize,
    pub user_scan_cap: usize,
    pub tag_scan_cap: usize,
    pub review_scan_cap: usize,
    pub scan_strategy: ScanStrategy,
    pub fuzzy_threshold: f64,
    pub weights: ScoringWeights,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 50,
            vibe_scan_cap: 1000,
            user_scan_cap: 500,
            tag_scan_cap: 500,
            review_scan_cap: 1000,
            scan_strategy: ScanStrategy::Indexed,
            fuzzy_threshold: crate::search::fuzzy::DEFAULT_THRESHOLD,
            weights: ScoringWeights::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionLimits {
    pub vibes: usize,
    pub users: usize,
    pub tags: usize,
    pub recent: usize,
    pub trending: usize,
}

impl Default for SuggestionLimits {
    fn default() -> Self {
        Self {
            vibes: 5,
            users: 3,
            tags: 5,
            recent: 5,
            trending: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Repeats of a query by the same user within this window update the
    /// existing history row
    pub coalesce_window_secs: i64,
    /// Most trending terms kept; lowest counts are evicted past this
    pub trending_cap: usize,
    pub suggestions: SuggestionLimits,
}

const DEFAULT_COALESCE_WINDOW_SECS: i64 = 300;

impl AnalyticsConfig {
    /// Coalesce window as a duration; out-of-range values fall back to the
    /// default window
    pub fn coalesce_window(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.coalesce_window_secs)
            .or_else(|| chrono::Duration::try_seconds(DEFAULT_COALESCE_WINDOW_SECS))
            .unwrap_or_default()
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            coalesce_window_secs: DEFAULT_COALESCE_WINDOW_SECS,
            trending_cap: 100,
            suggestions: SuggestionLimits::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub analytics: AnalyticsConfig,
    /// Snapshot file of the document store
    pub store_path: Option<PathBuf>,
    /// User id assumed when none is given on the command line
    pub default_user: Option<String>,
}

impl AppConfig {
    /// Configured snapshot path, else the per-user data directory
    pub fn resolved_store_path(&self) -> Result<PathBuf> {
        match &self.store_path {
            Some(path) => Ok(path.clone()),
            None => {
                let data_dir = dirs::data_dir().context("Cannot determine data directory")?;
                Ok(data_dir.join(APP_DIR).join("store.json"))
            }
        }
    }
}

/// Get the path to the configuration file
pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("Cannot determine config directory")?;
    Ok(config_dir.join(APP_DIR).join("config.json"))
}

/// Load configuration from `path`, or from the default location
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config_path()?,
    };

    // If file doesn't exist, return default config
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let data = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config: AppConfig = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    Ok(config)
}
