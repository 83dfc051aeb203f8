//! Retry logic with exponential backoff for transient transport errors.

use super::TransportError;
use std::thread;
use std::time::Duration;

/// Retry policy for a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Calculate the delay for a given attempt number (0-indexed).
    ///
    /// The result is clamped to `0..=max_delay`, so a negative or NaN
    /// backoff factor never panics.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64()).max(0.0);
        Duration::from_secs_f64(capped)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Execute an operation, retrying retryable errors with exponential backoff.
///
/// Non-retryable errors are returned immediately. After the last attempt the
/// last error is returned.
pub fn with_retry<T, F>(config: &RetryConfig, what: &str, mut operation: F) -> Result<T, TransportError>
where
    F: FnMut() -> Result<T, TransportError>,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() || attempt + 1 >= attempts => return Err(e),
            Err(e) => {
                let delay = config.delay_for_attempt(attempt);
                log::warn!(
                    "{what}: attempt {}/{} failed: {e}. Retrying in {:?}",
                    attempt + 1,
                    attempts,
                    delay
                );
                thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}
