// src/error.rs

//! Unified error handling for the ingestion pipeline.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Error raised by a single source adapter.
///
/// The variant decides how the adapter's retry wrapper reacts:
/// `RateLimit` and `Transient` are retried with backoff, `Auth` and
/// `Schema` are not. None of these can abort the overall run — a failed
/// adapter simply contributes zero records.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Authentication or authorization failed. Fatal to this adapter only.
    #[error("{provider}: authentication failed: {message}")]
    Auth { provider: String, message: String },

    /// The provider is rate limiting us. Retried with backoff.
    #[error("{provider}: rate limited")]
    RateLimit { provider: String },

    /// Transient network failure (timeout, connection reset, 5xx).
    #[error("{provider}: transient failure: {message}")]
    Transient { provider: String, message: String },

    /// The response did not match the expected shape.
    #[error("{provider}: malformed response: {message}")]
    Schema { provider: String, message: String },
}

impl ProviderError {
    pub fn auth(provider: impl Into<String>, message: impl ToString) -> Self {
        Self::Auth {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    pub fn rate_limit(provider: impl Into<String>) -> Self {
        Self::RateLimit {
            provider: provider.into(),
        }
    }

    pub fn transient(provider: impl Into<String>, message: impl ToString) -> Self {
        Self::Transient {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    pub fn schema(provider: impl Into<String>, message: impl ToString) -> Self {
        Self::Schema {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    /// Whether the retry wrapper should attempt this call again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit { .. } | Self::Transient { .. })
    }

    /// Classify a reqwest error by status and failure mode.
    pub fn from_reqwest(provider: &str, err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(provider, status);
        }
        if err.is_decode() {
            return Self::schema(provider, err);
        }
        // Timeouts, connect errors and anything without a status are
        // treated as transient.
        Self::transient(provider, err)
    }

    /// Classify an HTTP status code.
    pub fn from_status(provider: &str, status: reqwest::StatusCode) -> Self {
        use reqwest::StatusCode;
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Self::auth(provider, format!("HTTP {status}"))
            }
            StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
                Self::rate_limit(provider)
            }
            s if s.is_server_error() => Self::transient(provider, format!("HTTP {s}")),
            s => Self::schema(provider, format!("unexpected HTTP {s}")),
        }
    }
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid target date argument
    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    Date(String),

    /// Source adapter failure that escaped its retry wrapper
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
