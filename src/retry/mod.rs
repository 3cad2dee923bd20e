//! Retry with exponential backoff for transient venue failures

use crate::error::{BenchError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy: transient errors are reattempted with exponential
/// backoff, permanent errors surface immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Whether the error is worth another attempt
    pub fn should_retry(&self, error: &BenchError) -> bool {
        !error.is_permanent()
    }

    /// Run `op` up to `max_attempts` times, sleeping
    /// `base_delay * 2^(attempt - 1)` after each retryable failure.
    /// Raises the last error on a permanent failure or exhaustion.
    pub async fn execute<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !self.should_retry(&err) => {
                    warn!("permanent failure on attempt {}: {}", attempt, err);
                    return Err(err);
                }
                Err(err) if attempt >= self.max_attempts => {
                    warn!("giving up after {} attempts: {}", attempt, err);
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.base_delay * 2u32.pow(attempt - 1);
                    warn!(
                        "attempt {}/{} failed ({}), retrying in {:?}",
                        attempt, self.max_attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
