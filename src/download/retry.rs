//! Retry scheduling with exponential backoff and jitter.
//!
//! # Delay Calculation
//!
//! ```text
//! backoff(n) = base_delay * 2^(n + 1) + uniform(0, jitter_max)
//! pacing     = base_delay            + uniform(0, jitter_max)
//! ```
//!
//! `n` is the 0-based index of the attempt that just failed, so the first
//! retry already waits twice the base delay. Growth is not capped; with the
//! CLI limit of 10 retries the longest single wait is `base_delay * 1024`.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use exporter_core::download::{RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::new(2, Duration::from_secs(1), Duration::ZERO);
//! assert_eq!(
//!     policy.decide(0),
//!     RetryDecision::Retry { delay: Duration::from_secs(2), next_attempt: 1 }
//! );
//! assert_eq!(policy.decide(2), RetryDecision::Exhausted { attempts: 3 });
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use super::constants::{DEFAULT_BASE_DELAY_SECS, DEFAULT_JITTER_SECS, DEFAULT_MAX_RETRIES};

/// Decision taken after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for `delay`, then run attempt `next_attempt` (0-based).
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Index of the next attempt.
        next_attempt: u32,
    },

    /// No attempts left.
    Exhausted {
        /// Total attempts made.
        attempts: u32,
    },
}

/// Retry and pacing configuration shared by the fetcher and the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; attempts = `max_retries + 1`.
    max_retries: u32,

    /// Base delay for backoff and pacing.
    base_delay: Duration,

    /// Upper bound of the uniform jitter.
    jitter_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_secs_f64(DEFAULT_BASE_DELAY_SECS),
            jitter_max: Duration::from_secs_f64(DEFAULT_JITTER_SECS),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration, jitter_max: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            jitter_max,
        }
    }

    /// Creates a policy from second-based values as given on the command line.
    ///
    /// Negative or non-finite values are treated as zero.
    #[must_use]
    pub fn from_secs(max_retries: u32, base_delay_secs: f64, jitter_secs: f64) -> Self {
        Self::new(
            max_retries,
            secs_to_duration(base_delay_secs),
            secs_to_duration(jitter_secs),
        )
    }

    /// A policy with no waiting at all, for tests and dry runs.
    #[must_use]
    pub fn immediate(max_retries: u32) -> Self {
        Self::new(max_retries, Duration::ZERO, Duration::ZERO)
    }

    /// Returns the configured retry count.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts permitted per file.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Returns the base delay.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Returns the jitter bound.
    #[must_use]
    pub fn jitter_max(&self) -> Duration {
        self.jitter_max
    }

    /// Decides what happens after attempt `failed_attempt` (0-based) failed.
    #[instrument(level = "debug", skip(self), fields(max_retries = self.max_retries))]
    pub fn decide(&self, failed_attempt: u32) -> RetryDecision {
        if failed_attempt >= self.max_retries {
            debug!(failed_attempt, "retries exhausted");
            return RetryDecision::Exhausted {
                attempts: failed_attempt.saturating_add(1),
            };
        }

        let delay = self.backoff_delay(failed_attempt);
        debug!(
            failed_attempt,
            delay_ms = delay.as_millis(),
            "will retry"
        );
        RetryDecision::Retry {
            delay,
            next_attempt: failed_attempt + 1,
        }
    }

    /// Backoff before the retry that follows failed attempt `failed_attempt`.
    #[must_use]
    pub fn backoff_delay(&self, failed_attempt: u32) -> Duration {
        self.backoff_base(failed_attempt)
            .saturating_add(self.sample_jitter())
    }

    /// Pause between two manifest entries.
    #[must_use]
    pub fn pacing_delay(&self) -> Duration {
        self.base_delay.saturating_add(self.sample_jitter())
    }

    /// Deterministic part of the backoff: `base_delay * 2^(failed_attempt + 1)`.
    fn backoff_base(&self, failed_attempt: u32) -> Duration {
        let factor = 2f64.powi(i32::try_from(failed_attempt.saturating_add(1)).unwrap_or(i32::MAX));
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    }

    fn sample_jitter(&self) -> Duration {
        let max = self.jitter_max.as_secs_f64();
        if max <= 0.0 {
            return Duration::ZERO;
        }
        let secs = rand::thread_rng().gen_range(0.0..=max);
        Duration::from_secs_f64(secs)
    }
}

fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries(), 5);
        assert_eq!(policy.max_attempts(), 6);
        assert_eq!(policy.base_delay(), Duration::from_secs(1));
        assert_eq!(policy.jitter_max(), Duration::from_millis(500));
    }

    #[test]
    fn test_from_secs_clamps_invalid_values() {
        let policy = RetryPolicy::from_secs(1, -3.0, f64::NAN);
        assert_eq!(policy.base_delay(), Duration::ZERO);
        assert_eq!(policy.jitter_max(), Duration::ZERO);
    }

    // ==================== Delay Calculation Tests ====================

    #[test]
    fn test_backoff_starts_at_double_base() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1), Duration::ZERO);
        assert_eq!(policy.backoff_delay(0), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(8));
    }

    #[test]
    fn test_huge_delays_saturate_instead_of_overflowing() {
        let policy = RetryPolicy::from_secs(3, 1e30, 0.5);
        assert_eq!(policy.base_delay(), Duration::MAX);
        assert_eq!(policy.pacing_delay(), Duration::MAX);
        assert_eq!(policy.backoff_delay(0), Duration::MAX);
        assert_eq!(policy.backoff_delay(u32::MAX), Duration::MAX);
    }

    #[test]
    fn test_backoff_is_not_capped() {
        let policy = RetryPolicy::new(20, Duration::from_secs(1), Duration::ZERO);
        assert_eq!(policy.backoff_delay(9), Duration::from_secs(1024));
        assert_eq!(policy.backoff_delay(14), Duration::from_secs(32_768));
    }

    #[test]
    fn test_backoff_with_jitter_within_bounds() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(50));
        for _ in 0..100 {
            let delay = policy.backoff_delay(0);
            assert!(delay >= Duration::from_millis(200), "{delay:?}");
            assert!(delay <= Duration::from_millis(250), "{delay:?}");
        }
    }

    #[test]
    fn test_pacing_delay_within_bounds() {
        let policy = RetryPolicy::new(0, Duration::from_millis(100), Duration::from_millis(50));
        for _ in 0..100 {
            let delay = policy.pacing_delay();
            assert!(delay >= Duration::from_millis(100), "{delay:?}");
            assert!(delay <= Duration::from_millis(150), "{delay:?}");
        }
    }

    #[test]
    fn test_immediate_policy_never_waits() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(policy.backoff_delay(2), Duration::ZERO);
        assert_eq!(policy.pacing_delay(), Duration::ZERO);
    }

    // ==================== Decision Tests ====================

    #[test]
    fn test_decide_retries_until_max_retries() {
        let policy = RetryPolicy::immediate(2);
        assert!(matches!(
            policy.decide(0),
            RetryDecision::Retry { next_attempt: 1, .. }
        ));
        assert!(matches!(
            policy.decide(1),
            RetryDecision::Retry { next_attempt: 2, .. }
        ));
        assert_eq!(policy.decide(2), RetryDecision::Exhausted { attempts: 3 });
    }

    #[test]
    fn test_decide_zero_retries_means_single_attempt() {
        let policy = RetryPolicy::immediate(0);
        assert_eq!(policy.decide(0), RetryDecision::Exhausted { attempts: 1 });
    }
}
