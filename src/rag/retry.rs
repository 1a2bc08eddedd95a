//! Retry of transient model failures
//!
//! Fixed backoff between attempts. Only errors that report themselves as
//! transient are retried; everything else surfaces on the first failure.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::config::RetryConfig;
use crate::errors::Result;

/// Extra attempts after the first
pub const DEFAULT_MAX_RETRIES: u32 = 2;

pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::with_config(config.max_retries, Duration::from_secs(config.backoff_secs))
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::with_config(DEFAULT_MAX_RETRIES, DEFAULT_BACKOFF)
    }

    pub fn with_config(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Run `operation`, retrying transient failures
    ///
    /// At most `max_retries + 1` calls are made. When every attempt fails
    /// transiently the last error is returned unchanged.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "transient model failure, retrying"
                    );
                    sleep(self.backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Upper bound on time spent sleeping between attempts
    pub fn max_total_wait(&self) -> Duration {
        self.backoff * self.max_retries
    }
}
