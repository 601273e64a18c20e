use crate::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Transport-level retry policy: exponential backoff with uniform jitter.
/// Applied only to idempotent methods, and only on unavailability or
/// deadline expiry.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts including the original call.
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub multiplier: u32,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            multiplier: 2,
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (zero-based): the capped
    /// exponential base plus uniform jitter in [0, initial_backoff).
    pub fn backoff(&self, attempt: usize) -> Duration {
        let base = self
            .initial_backoff
            .saturating_mul(self.multiplier.saturating_pow(attempt as u32))
            .min(self.max_backoff);
        let jitter_ms = rand::thread_rng().gen_range(0..self.initial_backoff.as_millis().max(1));
        base + Duration::from_millis(jitter_ms as u64)
    }
}

/// Drive `op` to completion under `policy`. Non-idempotent calls are
/// never re-attempted.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, idempotent: bool, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !idempotent || !err.is_retryable() || attempt >= policy.max_attempts {
            return Err(err);
        }

        let backoff = policy.backoff(attempt - 1);
        tracing::debug!(attempt, ?backoff, error = %err, "retrying call");
        () = tokio::time::sleep(backoff).await;
        attempt += 1;
    }
}
