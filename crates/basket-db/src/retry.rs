//! # Bounded Retry
//!
//! Every ledger write runs through [`with_retry`]: transient conflicts (SQLite
//! busy/locked, a guarded update that lost its race) are retried with
//! exponential backoff, at most `max_attempts` times in total. Anything else,
//! including every business-rule error, is returned on the first attempt.
//!
//! ```text
//! attempt 1 ──► Conflict ──► sleep ~25ms
//! attempt 2 ──► Conflict ──► sleep ~50ms
//! attempt 3 ──► Ok(tx)                       ◄── caller sees success
//!
//! attempt N ──► Conflict ──► RetryExhausted { attempts: N }
//! ```

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::{error, warn};

use crate::error::{DbError, DbResult};

/// Retry budget for a single ledger operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(25),
            max_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        RetryPolicy {
            max_attempts: 1,
            ..Default::default()
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None, // bounded by max_attempts instead
            ..Default::default()
        }
    }
}

/// Runs `attempt` until it succeeds, fails permanently, or the budget runs out.
///
/// `attempt` must be safe to repeat: each call opens its own database
/// transaction, and a failed call leaves nothing behind.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut attempt: F) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut backoff = policy.backoff();
    let mut tries = 0;

    loop {
        tries += 1;
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && tries < max_attempts => {
                let delay = backoff.next_backoff().unwrap_or(policy.max_backoff);
                warn!(
                    operation,
                    attempt = tries,
                    ?delay,
                    error = %err,
                    "Transient conflict, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) if err.is_transient() => {
                error!(operation, attempts = tries, error = %err, "Retry budget exhausted");
                return Err(DbError::RetryExhausted {
                    attempts: tries,
                    last_error: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }
}
