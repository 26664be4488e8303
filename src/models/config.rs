//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and ingestion behavior settings
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Per-media-type filter rules
    #[serde(default)]
    pub filters: FilterConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    ///
    /// Called at startup, before any network call; a failure here is fatal.
    pub fn validate(&self) -> Result<()> {
        if self.ingest.user_agent.trim().is_empty() {
            return Err(AppError::validation("ingest.user_agent is empty"));
        }
        if self.ingest.timeout_secs == 0 {
            return Err(AppError::validation("ingest.timeout_secs must be > 0"));
        }
        if self.ingest.max_concurrent == 0 {
            return Err(AppError::validation("ingest.max_concurrent must be > 0"));
        }
        if self.ingest.max_retries == 0 {
            return Err(AppError::validation("ingest.max_retries must be > 0"));
        }
        if self.ingest.output_dir.trim().is_empty() {
            return Err(AppError::validation("ingest.output_dir is empty"));
        }
        if self.filters.min_movie_runtime > 600 {
            return Err(AppError::validation(
                "filters.min_movie_runtime is implausibly large",
            ));
        }
        Ok(())
    }
}

/// HTTP client and ingestion behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Polite delay between requests to the same provider, in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum adapters fetching concurrently (1 = sequential)
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Attempts per network call, including the first
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Backoff base delay in milliseconds; doubles per retry
    #[serde(default = "defaults::retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Directory receiving releases_<date>.json
    #[serde(default = "defaults::output_dir")]
    pub output_dir: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
            max_retries: defaults::max_retries(),
            retry_base_delay_ms: defaults::retry_base_delay(),
            output_dir: defaults::output_dir(),
        }
    }
}

/// Filter rules, loaded once per run and immutable afterwards.
///
/// Every rule is independent and scoped to one media type; the filter
/// engine evaluates them as a conjunction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Movies shorter than this many minutes are dropped (short films)
    #[serde(default = "defaults::min_movie_runtime")]
    pub min_movie_runtime: u32,

    /// When set, only movies/TV in this original language are kept
    #[serde(default)]
    pub language: Option<String>,

    /// Keep TV entries tagged with the "Talk" genre
    #[serde(default)]
    pub include_talk_shows: bool,

    /// Keep TV entries tagged with the "Reality" genre
    #[serde(default)]
    pub include_reality: bool,

    /// Keep TV entries tagged with the "News" genre
    #[serde(default)]
    pub include_news: bool,

    /// Keep music releases typed "Single"
    #[serde(default)]
    pub include_singles: bool,

    /// Cover-art lookups allowed per run, shared across adapters
    #[serde(default = "defaults::music_cover_art_limit")]
    pub music_cover_art_limit: usize,

    /// Book synopsis detail lookups allowed per run
    #[serde(default = "defaults::synopsis_lookup_limit")]
    pub synopsis_lookup_limit: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_movie_runtime: defaults::min_movie_runtime(),
            language: None,
            include_talk_shows: false,
            include_reality: false,
            include_news: false,
            include_singles: false,
            music_cover_art_limit: defaults::music_cover_art_limit(),
            synopsis_lookup_limit: defaults::synopsis_lookup_limit(),
        }
    }
}

impl FilterConfig {
    /// TV genres excluded by the toggle settings.
    pub fn excluded_tv_genres(&self) -> Vec<&'static str> {
        let mut excluded = Vec::new();
        if !self.include_talk_shows {
            excluded.push("Talk");
        }
        if !self.include_reality {
            excluded.push("Reality");
        }
        if !self.include_news {
            excluded.push("News");
        }
        excluded
    }
}

/// Per-provider API credentials, supplied via environment.
///
/// A missing credential disables only the adapter that needs it; keyless
/// providers (Open Library, Jikan, MusicBrainz) are unaffected.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub tmdb_api_key: Option<String>,
    pub igdb_client_id: Option<String>,
    pub igdb_client_secret: Option<String>,
}

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> Self {
        Self {
            tmdb_api_key: non_empty_env("TMDB_API_KEY"),
            igdb_client_id: non_empty_env("IGDB_CLIENT_ID"),
            igdb_client_secret: non_empty_env("IGDB_CLIENT_SECRET"),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

mod defaults {
    // Ingest defaults
    pub fn user_agent() -> String {
        "unreeled/1.0 (media release tracker)".into()
    }
    pub fn timeout() -> u64 {
        20
    }
    pub fn request_delay() -> u64 {
        250
    }
    pub fn max_concurrent() -> usize {
        1
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn retry_base_delay() -> u64 {
        500
    }
    pub fn output_dir() -> String {
        "output".into()
    }

    // Filter defaults
    pub fn min_movie_runtime() -> u32 {
        40
    }
    pub fn music_cover_art_limit() -> usize {
        80
    }
    pub fn synopsis_lookup_limit() -> usize {
        60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.ingest.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.ingest.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn excluded_tv_genres_follow_toggles() {
        let mut filters = FilterConfig::default();
        assert_eq!(filters.excluded_tv_genres(), vec!["Talk", "Reality", "News"]);

        filters.include_reality = true;
        assert_eq!(filters.excluded_tv_genres(), vec!["Talk", "News"]);

        filters.include_talk_shows = true;
        filters.include_news = true;
        assert!(filters.excluded_tv_genres().is_empty());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [filters]
            min_movie_runtime = 55
            include_singles = true
            "#,
        )
        .unwrap();
        assert_eq!(config.filters.min_movie_runtime, 55);
        assert!(config.filters.include_singles);
        assert_eq!(config.ingest.timeout_secs, 20);
        assert_eq!(config.filters.music_cover_art_limit, 80);
    }
}
