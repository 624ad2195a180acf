//! # Operation Runner
//!
//! Wraps each repository operation in the configured timeout and retry
//! policy.
//!
//! ```text
//! attempt 1 ──► timeout(op) ──► Ok ─────────────────────────► return
//!                     │
//!                     └── Err(replayable) and attempts left ──► sleep(next backoff)
//!                                                               attempt 2 ...
//! ```
//!
//! ## What Gets Replayed
//! ```text
//!                     Busy   PoolExhausted   Timeout   ConnectionFailed
//! read(...)            ✓          ✓             ✓             ✓
//! write(...)           ✓          ✓             ✗             ✗
//! ```
//! A timed-out write is abandoned, not cancelled: the SQLite worker keeps
//! the statement and may still commit it once the lock frees up. Writes are
//! therefore replayed only after errors raised before anything was applied.
//! A replayed batch starts from a clean state because the failed attempt's
//! transaction was rolled back when it was dropped.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use tracing::warn;

use crate::error::{DbError, DbResult};
use crate::pool::RetryPolicy;

#[derive(Debug, Clone)]
pub(crate) struct Runner {
    timeout: Duration,
    retry: RetryPolicy,
}

impl Default for Runner {
    fn default() -> Self {
        Runner {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl Runner {
    pub(crate) fn new(timeout: Duration, retry: RetryPolicy) -> Self {
        Runner { timeout, retry }
    }

    /// Runs a read-only operation, re-attempting any retryable error.
    pub(crate) async fn read<T, F, Fut>(&self, operation: &'static str, attempt: F) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        self.run(operation, DbError::is_retryable, attempt).await
    }

    /// Runs an operation that writes, re-attempting only errors that left
    /// the database untouched.
    pub(crate) async fn write<T, F, Fut>(&self, operation: &'static str, attempt: F) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        self.run(operation, DbError::is_safe_to_replay, attempt).await
    }

    async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        replayable: fn(&DbError) -> bool,
        mut attempt: F,
    ) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut schedule = self.retry.schedule();
        let mut tries = 1;

        loop {
            let result = match tokio::time::timeout(self.timeout, attempt()).await {
                Ok(result) => result,
                Err(_) => Err(DbError::Timeout(self.timeout)),
            };

            match result {
                Err(e) if replayable(&e) && tries < max_attempts => {
                    let delay = schedule.next_backoff().unwrap_or(self.retry.max_backoff);
                    warn!(
                        operation,
                        attempt = tries,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after storage error"
                    );
                    tokio::time::sleep(delay).await;
                    tries += 1;
                }
                other => return other,
            }
        }
    }
}
