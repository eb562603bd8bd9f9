//! Retry policy: attempt ceiling and exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::TaskConfig;

/// Jitter spans ±25 % of the computed delay
pub const JITTER_FACTOR: f64 = 0.25;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Double the delay after every failed attempt
    pub backoff: bool,
    pub jitter: bool,
    /// Ceiling for a single delay, before jitter
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&TaskConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &TaskConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_secs(config.base_delay_seconds),
            backoff: config.retry_backoff,
            jitter: config.retry_jitter,
            max_delay: Duration::from_secs(config.max_delay_seconds),
        }
    }

    /// Constant delay, no jitter.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            backoff: false,
            jitter: false,
            max_delay: delay,
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// True if a task that has run `attempts` times may run again.
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Delay after failed attempt number `attempt` (1-based), before jitter.
    ///
    /// `base · 2^(attempt−1)` capped at `max_delay` with backoff, `base` otherwise.
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        if !self.backoff {
            return self.base_delay;
        }

        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Delay after failed attempt number `attempt`, with jitter when enabled.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let nominal = self.nominal_delay(attempt);
        if !self.jitter {
            return nominal;
        }

        let seconds = nominal.as_secs_f64();
        let span = seconds * JITTER_FACTOR;
        if span <= 0.0 {
            return nominal;
        }

        let offset = rand::rng().random_range(-span..=span);
        Duration::from_secs_f64((seconds + offset).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(60),
            backoff: true,
            jitter: false,
            max_delay: Duration::from_secs(3600),
        }
    }

    #[test]
    fn test_defaults_follow_task_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(60));
        assert!(policy.backoff);
        assert!(policy.jitter);
    }

    #[test]
    fn test_exponential_delays() {
        let policy = policy();
        assert_eq!(policy.delay_for(1), Duration::from_secs(60));
        assert_eq!(policy.delay_for(2), Duration::from_secs(120));
        assert_eq!(policy.delay_for(3), Duration::from_secs(240));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = policy();
        assert_eq!(policy.delay_for(10), Duration::from_secs(3600));
        // huge attempt numbers must not overflow
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(3600));
    }

    #[test]
    fn test_no_backoff_uses_base() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(60));
        assert_eq!(policy.delay_for(1), Duration::from_secs(60));
        assert_eq!(policy.delay_for(3), Duration::from_secs(60));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            jitter: true,
            ..policy()
        };

        for _ in 0..200 {
            let delay = policy.delay_for(2).as_secs_f64();
            assert!((90.0..=150.0).contains(&delay), "delay out of range: {}", delay);
        }
    }

    #[test]
    fn test_zero_base_with_jitter() {
        let policy = RetryPolicy {
            base_delay: Duration::ZERO,
            jitter: true,
            ..policy()
        };
        assert_eq!(policy.delay_for(1), Duration::ZERO);
    }

    #[test]
    fn test_allows_retry() {
        let policy = policy();
        assert!(policy.allows_retry(1));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));
    }
}
