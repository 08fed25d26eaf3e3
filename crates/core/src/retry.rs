//! Bounded exponential backoff for transient failures
//!
//! Used by the relay's broker adapters: the startup connectivity probe and
//! individual publish attempts both run under a [`RetryPolicy`].
//!
//! # Example
//!
//! ```
//! use fleet_gateway_core::retry::{retry_with_backoff, RetryPolicy};
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let attempts = AtomicU32::new(0);
//! let result = retry_with_backoff(
//!     || async {
//!         if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
//!             Err("broker not ready")
//!         } else {
//!             Ok("connected")
//!         }
//!     },
//!     RetryPolicy::default(),
//!     |_: &&str| true,
//! )
//! .await;
//! assert!(result.is_ok());
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the initial one (0 disables retries)
    pub max_retries: u32,

    /// Base delay in milliseconds for the first retry
    pub base_delay_ms: u64,

    /// Cap on the exponential delay growth, milliseconds
    pub max_delay_ms: u64,

    /// Add random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    /// 3 retries, 100ms base, 5s cap, jitter on
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with custom parameters
    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64, jitter: bool) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
            jitter,
        }
    }

    /// Gentle policy for per-request retries on a hot path
    ///
    /// 2 retries, 500ms base, 3s cap. A publish that fails this often is
    /// reported to the caller rather than retried further.
    pub fn gentle() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            max_delay_ms: 3000,
            jitter: true,
        }
    }

    /// Delay before the retry with the given 0-indexed attempt number
    ///
    /// Exponential backoff capped at `max_delay_ms`, plus up to 30% jitter
    /// seeded from the clock when enabled.
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponential_delay = self
            .base_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt));

        let capped_delay = exponential_delay.min(self.max_delay_ms);

        let final_delay = if self.jitter {
            let jitter_range = (capped_delay as f64 * 0.3) as u64;
            let jitter = if jitter_range > 0 {
                let nanos = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .subsec_nanos() as u64;
                nanos % (jitter_range + 1)
            } else {
                0
            };
            capped_delay.saturating_add(jitter)
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay)
    }
}

/// Retry an async operation with exponential backoff
///
/// Runs `operation` until it succeeds, the error is not retryable, or the
/// policy's attempts are exhausted. The last error is returned unchanged.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    mut operation: F,
    policy: RetryPolicy,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                tracing::debug!(attempt = attempt, "Operation succeeded");
                return Ok(result);
            }
            Err(error) => {
                if attempt >= policy.max_retries {
                    tracing::warn!(
                        attempt = attempt,
                        max_retries = policy.max_retries,
                        "All retry attempts exhausted"
                    );
                    return Err(error);
                }

                if !is_retryable(&error) {
                    tracing::debug!(attempt = attempt, "Error is not retryable");
                    return Err(error);
                }

                let delay = policy.calculate_delay(attempt);
                tracing::debug!(
                    attempt = attempt,
                    delay_ms = delay.as_millis(),
                    "Retrying after delay"
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
