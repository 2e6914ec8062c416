//! # Conflict Retry
//!
//! Re-runs a whole unit of work when it lost the race for SQLite's write
//! lock.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  attempt 1 ──► Ok ───────────────────────────────────────► return Ok    │
//! │     │                                                                   │
//! │     ├── terminal error (stock, validation, not found) ──► return Err    │
//! │     │                                                                   │
//! │     └── ConcurrencyConflict                                             │
//! │            │                                                            │
//! │            ├── attempts left  → sleep(next_backoff) → attempt n + 1     │
//! │            └── exhausted      → ConcurrencyConflict { attempts: n }     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The closure must open and commit its own transaction: a retried attempt
//! starts from a clean database state.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};

/// How conflicting units of work are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. At least 1.
    pub max_attempts: u32,

    /// Wait before the second attempt.
    pub initial_backoff: Duration,

    /// Upper bound for a single wait.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    /// Runs `operation` until it succeeds, fails terminally, or the
    /// attempts are used up.
    pub async fn run<T, F, Fut>(&self, name: &str, mut operation: F) -> EngineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EngineResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut backoff = self.create_backoff();
        let mut attempt = 1u32;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = name, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() => {
                    if attempt >= max_attempts {
                        warn!(
                            operation = name,
                            attempts = attempt,
                            "Giving up after repeated conflicts"
                        );
                        return Err(EngineError::ConcurrencyConflict { attempts: attempt });
                    }

                    let delay = backoff.next_backoff().unwrap_or(self.max_backoff);
                    warn!(
                        operation = name,
                        attempt,
                        ?delay,
                        "Write conflict, retrying unit of work"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}
