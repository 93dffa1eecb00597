use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    /// Model failures are recorded, not retried.
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: 1000,
            max_backoff_ms: 10000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
        }
    }

    pub fn none() -> Self {
        Self::new(0, 0, 0)
    }

    /// Run `f` until it succeeds or `max_retries` further attempts have
    /// failed. The backoff doubles after each failure, up to `max_backoff`.
    pub async fn retry<F, Fut, T, E>(&self, operation: &str, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            let error = match f().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Succeeded on retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if attempt > self.max_retries {
                return Err(error);
            }

            warn!(
                operation,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "Attempt failed, backing off"
            );
            sleep(backoff).await;
            backoff = (backoff * 2).min(self.max_backoff);
            attempt += 1;
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.initial_backoff_ms, config.max_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_no_retries_by_default() {
        let policy = RetryPolicy::from(&RetryConfig::default());
        let attempts = Cell::new(0);

        let result: Result<(), String> = policy
            .retry("op", || {
                attempts.set(attempts.get() + 1);
                async { Err("endpoint down".to_string()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_retry() {
        let policy = RetryPolicy::new(2, 1, 2);
        let attempts = Cell::new(0);

        let result: Result<u32, String> = policy
            .retry("op", || {
                attempts.set(attempts.get() + 1);
                let n = attempts.get();
                async move { if n < 2 { Err("flaky".to_string()) } else { Ok(n) } }
            })
            .await;

        assert_eq!(result, Ok(2));
    }
}
