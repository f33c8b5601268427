// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry with exponential backoff for durable-backend calls.
//!
//! Only transient backend hiccups are retried here. Anything that survives
//! the retry budget is a `BackendUnavailable` condition, and the
//! [`FallbackStore`](crate::storage::fallback::FallbackStore) answers it by
//! switching to memory.
//!
//! # Example
//!
//! ```
//! use recall_engine::resilience::retry::RetryConfig;
//!
//! // Connect: a few attempts, then give up and fall back to memory
//! let connect = RetryConfig::connect();
//! assert_eq!(connect.max_attempts, 4);
//!
//! // Operation: one quick retry, callers are latency sensitive
//! let op = RetryConfig::operation();
//! assert_eq!(op.max_attempts, 2);
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Backoff schedule for a retried operation.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
    /// Total attempts including the first one (minimum 1)
    pub max_attempts: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::operation()
    }
}

impl RetryConfig {
    /// Connection establishment at startup: ~1.5s worst case before the
    /// cache manager gives up on the durable backend.
    #[must_use]
    pub fn connect() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            factor: 2.0,
        }
    }

    /// Single cache operation on the hot path.
    #[must_use]
    pub fn operation() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(200),
            factor: 2.0,
        }
    }

    /// Delay before attempt `n + 1` given the delay before attempt `n`.
    #[must_use]
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.mul_f64(self.factor).min(self.max_delay)
    }
}

/// Run `operation` until it succeeds or `config.max_attempts` is reached.
pub async fn retry<F, Fut, T, E>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay;
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(val) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "Operation succeeded after retry");
                }
                return Ok(val);
            }
            Err(err) if attempt >= max_attempts => {
                warn!(operation = operation_name, attempts = attempt, error = %err, "Operation failed, retries exhausted");
                return Err(err);
            }
            Err(err) => {
                debug!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    error = %err,
                    ?delay,
                    "Operation failed, retrying"
                );
                sleep(delay).await;
                delay = config.next_delay(delay);
                attempt += 1;
            }
        }
    }
}
