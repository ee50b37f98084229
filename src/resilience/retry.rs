//! Exponential backoff retry and the retrying transport decorator.

use crate::config::S3Config;
use crate::error::S3Error;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Add jitter to backoff.
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(20),
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Retry settings taken from the client configuration.
    pub fn from_config(config: &S3Config) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
            backoff_multiplier: config.backoff_multiplier,
            use_jitter: true,
        }
    }

    /// Disable or enable jitter.
    pub fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }
}

/// Executes operations with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a new retry policy with the given configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or runs out of attempts.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, S3Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, S3Error>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(attempt, "Operation succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(error) if error.is_retryable() && attempt < self.config.max_retries => {
                    let backoff = error
                        .retry_after()
                        .unwrap_or_else(|| self.calculate_backoff(attempt));
                    debug!(attempt, backoff_ms = backoff.as_millis() as u64, error = %error, "Retrying after backoff");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(error) => {
                    if attempt > 0 {
                        warn!(attempt, error = %error, "Operation failed after retries");
                    }
                    return Err(error);
                }
            }
        }
    }

    /// Backoff before retry number `attempt` (zero-based).
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base = self.config.initial_backoff.as_millis() as f64;
        let multiplied = base * self.config.backoff_multiplier.powi(attempt as i32);
        let capped = multiplied.min(self.config.max_backoff.as_millis() as f64);

        let final_ms = if self.config.use_jitter {
            capped * (0.5 + jitter_fraction() * 0.5)
        } else {
            capped
        };

        Duration::from_millis(final_ms as u64)
    }

    /// Get the retry configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

/// Value in `[0, 1)` derived from the clock; good enough to spread retries.
fn jitter_fraction() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    f64::from(nanos % 1000) / 1000.0
}

/// Transport decorator that retries network failures and 5xx responses.
///
/// Requests are resent unchanged, so a signed request must still be
/// within its validity window when a retry goes out.
pub struct RetryingTransport {
    inner: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
}

impl RetryingTransport {
    /// Wrap a transport.
    pub fn new(inner: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    fn retryable_status(status: u16) -> bool {
        matches!(status, 500 | 502 | 503 | 504)
    }
}

#[async_trait]
impl HttpTransport for RetryingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, S3Error> {
        let max_retries = self.policy.config().max_retries;
        let mut attempt = 0;

        loop {
            let outcome = self.inner.send(request.clone()).await;
            let backoff = match &outcome {
                Ok(response) if Self::retryable_status(response.status) => response
                    .retry_after()
                    .unwrap_or_else(|| self.policy.calculate_backoff(attempt)),
                Err(error) if error.is_retryable() => error
                    .retry_after()
                    .unwrap_or_else(|| self.policy.calculate_backoff(attempt)),
                _ => return outcome,
            };

            if attempt >= max_retries {
                warn!(
                    method = %request.method,
                    url = %request.url,
                    attempts = attempt + 1,
                    "Giving up after retries"
                );
                return outcome;
            }

            debug!(
                method = %request.method,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                "Retrying request"
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

impl std::fmt::Debug for RetryingTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingTransport")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
