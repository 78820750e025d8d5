//! Bounded, cancellation-aware retry with exponential backoff and jitter.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Transient};


/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration, max_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
            max_delay: max_delay.max(delay),
        }
    }

    /// Backoff before attempt `n + 1` (n starts at 1): `delay * 2^(n-1)`, capped, plus up to 10% jitter.
    pub fn backoff(&self, n: u32) -> Duration {
        let exp = n.saturating_sub(1).min(16);
        let base = self
            .delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay);
        let jitter_ms = (base.as_millis() as u64) / 10;
        if jitter_ms == 0 {
            return base;
        }
        let extra = rand::thread_rng().gen_range(0..=jitter_ms);
        (base + Duration::from_millis(extra)).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(250), Duration::from_secs(5))
    }
}

/// Why `retry` gave up.
#[derive(Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    Cancelled,
    /// A permanent error; returned on the attempt that produced it.
    Permanent(E),
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E>
where
    E: Into<Error>,
{
    /// Folds into the crate error, naming the operation that failed.
    pub fn into_error(self, what: &str) -> Error {
        match self {
            RetryError::Cancelled => Error::Cancelled,
            RetryError::Permanent(e) => e.into(),
            RetryError::Exhausted { attempts, last } => Error::RetriesExhausted {
                what: what.to_string(),
                attempts,
                source: Box::new(last.into()),
            },
        }
    }
}

/// Runs `op` until it succeeds, fails permanently, exhausts the policy, or `token` is cancelled.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    what: &str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: Transient + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let res = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(RetryError::Cancelled),
            res = op() => res,
        };
        let err = match res {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        if !err.is_transient() {
            return Err(RetryError::Permanent(err));
        }
        if attempt >= policy.attempts {
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: err,
            });
        }

        let wait = policy.backoff(attempt);
        debug!(
            component = "retry",
            event = "backoff",
            what,
            attempt,
            wait_ms = wait.as_millis() as u64,
            error = %err,
            "transient failure, retrying"
        );
        tokio::select! {
            biased;
            _ = token.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(wait) => {}
        }
    }
}
