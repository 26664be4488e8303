// src/utils/http.rs

//! HTTP client construction and the bounded-retry policy shared by all
//! source adapters.

use std::future::Future;
use std::time::Duration;

use crate::error::{ProviderError, Result};
use crate::models::IngestConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_client(config: &IngestConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Bounded retry policy with exponential backoff.
///
/// Wraps a network call and retries it while the error is retryable
/// (`RateLimit`, `Transient`). `Auth` and `Schema` errors are returned
/// immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(base_delay_ms),
        }
    }

    /// Backoff delay after the given 1-based attempt number.
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Run `op`, retrying retryable failures up to `max_attempts` times.
    pub async fn run<T, F, Fut>(
        &self,
        provider: &str,
        mut op: F,
    ) -> std::result::Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, ProviderError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_after(attempt);
                    log::warn!(
                        "{provider}: attempt {attempt}/{} failed ({err}), retrying in {}ms",
                        self.max_attempts,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Map a non-success response to the matching `ProviderError`.
pub fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> std::result::Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ProviderError::from_status(provider, status))
    }
}
