//! # Backoff policy for recovery retries.
//!
//! [`BackoffPolicy`] computes how long a recovery strategy waits before the next
//! attempt. The delay before retry `n` (0-indexed) is `first × factor^n`,
//! clamped to `max`, then jittered. This is the closed form of the classic
//! "sleep(delay); delay *= multiplier" loop, so the jittered value never feeds
//! back into the next delay.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use faultguard::BackoffPolicy;
//!
//! // Data errors: 1s, doubling.
//! let backoff = BackoffPolicy::exponential(Duration::from_secs(1), 2.0);
//! assert_eq!(backoff.next(0), Duration::from_secs(1));
//! assert_eq!(backoff.next(2), Duration::from_secs(4));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::policies::jitter::JitterPolicy;

/// Retry delay policy of a recovery strategy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Upper bound for any single delay.
    pub max: Duration,
    /// Multiplier applied per retry (`1.0` = constant delay).
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// 1s constant delay, capped at 60s, no jitter.
    fn default() -> Self {
        Self::constant(Duration::from_secs(1))
    }
}

impl BackoffPolicy {
    /// Default cap used by the convenience constructors.
    pub const DEFAULT_MAX: Duration = Duration::from_secs(60);

    /// Delay grows by `factor` after each failed attempt.
    pub fn exponential(first: Duration, factor: f64) -> Self {
        Self {
            first,
            max: Self::DEFAULT_MAX,
            factor,
            jitter: JitterPolicy::None,
        }
    }

    /// Same delay before every retry.
    pub fn constant(delay: Duration) -> Self {
        Self::exponential(delay, 1.0)
    }

    /// No waiting between attempts.
    pub fn immediate() -> Self {
        Self::constant(Duration::ZERO)
    }

    /// Returns a copy with a different cap.
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }

    /// Returns a copy with a different jitter policy.
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Computes the delay that follows failed attempt `attempt` (0-indexed).
    ///
    /// Non-finite or negative intermediate values (huge exponents, bogus factors)
    /// collapse to [`BackoffPolicy::max`].
    pub fn next(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if secs.is_finite() && secs >= 0.0 && secs <= self.max.as_secs_f64() {
            Duration::from_secs_f64(secs)
        } else {
            self.max
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_strategy_schedule() {
        let policy = BackoffPolicy::exponential(Duration::from_millis(500), 1.5);
        assert_eq!(policy.next(0), Duration::from_millis(500));
        assert_eq!(policy.next(1), Duration::from_millis(750));
        assert_eq!(policy.next(2), Duration::from_micros(1_125_000));
    }

    #[test]
    fn test_constant_delay() {
        let policy = BackoffPolicy::constant(Duration::from_secs(2));
        for attempt in 0..5 {
            assert_eq!(policy.next(attempt), Duration::from_secs(2));
        }
    }

    #[test]
    fn test_cap_and_overflow() {
        let policy =
            BackoffPolicy::exponential(Duration::from_secs(1), 2.0).with_max(Duration::from_secs(8));
        assert_eq!(policy.next(3), Duration::from_secs(8));
        assert_eq!(policy.next(10), Duration::from_secs(8));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(8));
    }

    #[test]
    fn test_immediate_is_zero() {
        assert_eq!(BackoffPolicy::immediate().next(7), Duration::ZERO);
    }

    #[test]
    fn test_equal_jitter_stays_within_half_and_base() {
        let policy = BackoffPolicy::exponential(Duration::from_millis(400), 2.0)
            .with_jitter(JitterPolicy::Equal);
        for _ in 0..50 {
            let d = policy.next(1);
            assert!(d >= Duration::from_millis(400) && d <= Duration::from_millis(800));
        }
    }
}
