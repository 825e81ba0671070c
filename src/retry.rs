//! Bounded retries with exponential backoff.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

const MAX_DELAY: Duration = Duration::from_secs(30);

/// How often, and how patiently, a remote operation is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

impl RetryPolicy {
    /// Creates a policy making at most `attempts` attempts (at least one),
    /// waiting `delay` before the first retry and doubling it after that.
    #[must_use]
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: if attempts == 0 { 1 } else { attempts },
            delay,
        }
    }

    /// Maximum number of attempts.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay before retry number `retry` (1-based), capped at 30 seconds.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.delay.saturating_mul(factor).min(MAX_DELAY)
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Only transport and I/O failures are retried. HTTP 4xx answers and
    /// every other error are returned as is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RetriesExhausted`] naming `operation` when every
    /// attempt failed with a transient error.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        log::debug!("{operation} succeeded on attempt {attempt}");
                    }
                    return Ok(value);
                }
                Err(e) if !is_transient(&e) => return Err(e),
                Err(e) if attempt >= self.attempts => {
                    return Err(Error::RetriesExhausted {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last_error: e.full_message(),
                    });
                }
                Err(e) => {
                    let wait = self.backoff(attempt);
                    log::warn!(
                        "{operation} failed (attempt {attempt}/{}): {e}; retrying in {wait:?}",
                        self.attempts
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

fn is_transient(error: &Error) -> bool {
    match error {
        Error::Http(e) => !e.status().is_some_and(|s| s.is_client_error()),
        Error::Io(_) | Error::Transfer { .. } => true,
        _ => false,
    }
}
