//! Retry with linear backoff for small attribute-style writes.
//!
//! Bulk paths (catalog batches, deletes) never retry; only idempotent
//! single-object updates such as writing a probed duration back onto an
//! object go through here.
//!
//! # Example
//!
//! ```rust,ignore
//! use clipkeep::reliability::retry::{retry_async, RetryConfig};
//!
//! let meta = retry_async(
//!     RetryConfig::default(),
//!     || storage.update_metadata(path, metadata.clone()),
//!     |_| true,
//! )
//! .await?;
//! ```

use backon::{BackoffBuilder, Retryable};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Delay added per attempt: retry `n` waits `n * step`.
    pub step: Duration,
    /// Upper bound on a single delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            step: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub const fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    fn build_backoff(&self) -> LinearBuilder {
        LinearBuilder {
            step: self.step,
            max_delay: self.max_delay,
            max_times: self.max_retries as usize,
        }
    }
}

/// Builder for [`LinearBackoff`].
#[derive(Debug, Clone, Copy)]
pub struct LinearBuilder {
    step: Duration,
    max_delay: Duration,
    max_times: usize,
}

impl BackoffBuilder for LinearBuilder {
    type Backoff = LinearBackoff;

    fn build(self) -> Self::Backoff {
        LinearBackoff {
            builder: self,
            attempt: 0,
        }
    }
}

/// Delays of `step`, `2 * step`, `3 * step`, ... capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    builder: LinearBuilder,
    attempt: usize,
}

impl Iterator for LinearBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.attempt >= self.builder.max_times {
            return None;
        }
        self.attempt += 1;
        let multiplier = u32::try_from(self.attempt).unwrap_or(u32::MAX);
        Some(
            self.builder
                .step
                .saturating_mul(multiplier)
                .min(self.builder.max_delay),
        )
    }
}

/// Retry an async operation with linear backoff.
///
/// # Arguments
///
/// * `config` - Retry configuration
/// * `operation` - The async operation to retry
/// * `is_retryable` - Predicate deciding whether an error is worth retrying
///
/// # Returns
///
/// The result of the operation, or the last error once retries run out.
pub async fn retry_async<F, Fut, T, E, R>(
    config: RetryConfig,
    operation: F,
    is_retryable: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let backoff = config.build_backoff();
    let max_retries = config.max_retries;

    let mut attempt = 0u32;
    let notify = |err: &E, dur: Duration| {
        attempt += 1;
        warn!(
            attempt = attempt,
            max_retries = max_retries,
            next_delay_ms = dur.as_millis() as u64,
            error = %err,
            "Retry attempt failed, will retry"
        );
    };

    operation
        .retry(backoff)
        .when(move |e| is_retryable(e))
        .notify(notify)
        .await
}
