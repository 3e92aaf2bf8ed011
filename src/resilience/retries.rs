//! Retry logic.
//!
//! # Responsibilities
//! - Re-run a fallible async operation a bounded number of times
//! - Wait a fixed delay between attempts
//! - Log every failed attempt with its attempt number
//!
//! # Design Decisions
//! - `retries` counts additional attempts, so `retries = 0` means one try
//! - Fixed delay rather than backoff: broker I/O failures are short-lived
//!   file contention, not overload

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::config::BrokerConfig;

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first.
    pub retries: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// Total number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

impl From<&BrokerConfig> for RetryPolicy {
    fn from(config: &BrokerConfig) -> Self {
        Self::new(config.request_retry_count, config.retry_delay())
    }
}

/// Run `operation` until it succeeds or the policy is exhausted.
///
/// `operation` receives the 1-based attempt number. The last error is
/// returned once every attempt has failed.
pub async fn retry_with_fixed_delay<T, E, F, Fut>(
    policy: RetryPolicy,
    description: &str,
    mut operation: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts() => {
                tracing::warn!(
                    operation = description,
                    attempt,
                    max_attempts = policy.max_attempts(),
                    delay = ?policy.delay,
                    error = %e,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
