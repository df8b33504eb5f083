//! Retry policy with capped exponential backoff.

use std::time::Duration;

use crate::{Error, Result};

/// How many times to try a request and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Always at least 1.
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Ceiling for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Create a policy, rejecting zero attempts.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Result<Self> {
        if max_attempts == 0 {
            return Err(Error::Config("retry policy needs at least one attempt".into()));
        }
        Ok(Self {
            max_attempts,
            base_delay,
            max_delay,
        })
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay scheduled after failed attempt `attempt` (1-indexed):
    /// `min(base * 2^(attempt-1), max_delay)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        // Clamp before multiplying: once the shift overflows the ceiling wins.
        let factor = match 1u32.checked_shl(exponent) {
            Some(factor) => factor,
            None => return self.max_delay,
        };
        match self.base_delay.checked_mul(factor) {
            Some(delay) => delay.min(self.max_delay),
            None => self.max_delay,
        }
    }
}

/// Statuses worth retrying: 429 and every 5xx.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base_ms: u64, max_ms: u64) -> RetryPolicy {
        RetryPolicy::new(5, Duration::from_millis(base_ms), Duration::from_millis(max_ms)).unwrap()
    }

    #[test]
    fn test_delay_doubles() {
        let p = policy(10, 10_000);
        assert_eq!(p.delay_for(1), Duration::from_millis(10));
        assert_eq!(p.delay_for(2), Duration::from_millis(20));
        assert_eq!(p.delay_for(3), Duration::from_millis(40));
        assert_eq!(p.delay_for(4), Duration::from_millis(80));
    }

    #[test]
    fn test_delay_capped_at_ceiling() {
        let p = policy(100, 250);
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(250));
        assert_eq!(p.delay_for(10), Duration::from_millis(250));
    }

    #[test]
    fn test_delay_matches_formula_for_every_attempt() {
        let p = policy(7, 1_000);
        for i in 1..=p.max_attempts {
            let expected = Duration::from_millis((7u64 << (i - 1)).min(1_000));
            assert_eq!(p.delay_for(i), expected, "attempt {}", i);
        }
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let p = policy(500, 30_000);
        assert_eq!(p.delay_for(40), Duration::from_millis(30_000));
        assert_eq!(p.delay_for(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert!(RetryPolicy::new(0, Duration::from_millis(1), Duration::from_millis(1)).is_err());
    }

    #[test]
    fn test_retryable_statuses() {
        for status in [429, 500, 501, 502, 503, 504, 599] {
            assert!(is_retryable_status(status), "{}", status);
        }
        for status in [200, 204, 400, 401, 403, 404, 409, 422, 600] {
            assert!(!is_retryable_status(status), "{}", status);
        }
    }
}
