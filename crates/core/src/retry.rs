use std::future::Future;
use std::time::Duration;

/// Bounded retries with exponential backoff: the n-th retry (0-based) waits
/// `initial_backoff * 2^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
        }
    }

    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. The last error is returned on exhaustion.
    pub async fn run<T, E, F, Fut, R>(&self, op_name: &str, is_retryable: R, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(v) => {
                    if attempt > 1 {
                        tracing::debug!(op = op_name, attempt, "succeeded after retry");
                    }
                    return Ok(v);
                }
                Err(err) => {
                    if attempt >= max_attempts || !is_retryable(&err) {
                        return Err(err);
                    }
                    let backoff = self.backoff_for(attempt - 1);
                    tracing::warn!(
                        op = op_name,
                        attempt,
                        max_attempts,
                        ?backoff,
                        error = %err,
                        "request failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
