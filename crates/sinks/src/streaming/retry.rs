//! Retry classification and backoff
//!
//! Reasons `invalid`, `invalidQuery` and `notImplemented` are permanent;
//! every other reason is transient. Backoff is a fuzzed exponential
//! sequence: the un-jittered delay doubles from `initial` up to `max`, and
//! each yielded delay is scaled by a factor in `[1 - fuzz, 1)`.

use std::time::Duration;

use rand::Rng;
use tabwrite_config::{RetryConfig, RetryStrategy};

/// Reasons that never succeed on retry
pub const PERMANENT_REASONS: [&str; 3] = ["invalid", "invalidQuery", "notImplemented"];

/// Growth factor between consecutive delays
pub const BACKOFF_FACTOR: f64 = 2.0;

/// Fraction of each delay subject to jitter
pub const BACKOFF_FUZZ: f64 = 0.5;

/// True unless `reason` is one of the permanent reasons
pub fn is_transient(reason: &str) -> bool {
    !PERMANENT_REASONS.contains(&reason)
}

/// Whether a row failing with `reason` justifies another attempt
pub fn should_retry(strategy: RetryStrategy, reason: &str) -> bool {
    match strategy {
        RetryStrategy::RetryAlways => true,
        RetryStrategy::RetryNever => false,
        RetryStrategy::RetryOnTransientError => is_transient(reason),
    }
}

/// Fuzzed exponential backoff bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
}

impl Backoff {
    /// Backoff from `initial` doubling up to `max`
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// Backoff from the `[write.retry]` section
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.initial_delay, config.max_delay)
    }

    /// Un-jittered delay before retry number `attempt` (0-based)
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let scaled = self.initial.as_secs_f64() * BACKOFF_FACTOR.powi(attempt.min(64) as i32);
        let capped = scaled.min(self.max.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Jittered delay for `attempt` given a uniform `sample` in `[0, 1)`
    pub fn delay(&self, attempt: u32, sample: f64) -> Duration {
        let sample = sample.clamp(0.0, 1.0);
        self.base_delay(attempt)
            .mul_f64(1.0 - BACKOFF_FUZZ + sample * BACKOFF_FUZZ)
    }

    /// Fresh, unbounded delay sequence for one flush loop
    pub fn intervals(&self) -> BackoffIntervals {
        BackoffIntervals {
            backoff: *self,
            attempt: 0,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Endless sequence of jittered delays
#[derive(Debug, Clone)]
pub struct BackoffIntervals {
    backoff: Backoff,
    attempt: u32,
}

impl Iterator for BackoffIntervals {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let sample: f64 = rand::rng().random();
        let delay = self.backoff.delay(self.attempt, sample);
        self.attempt = self.attempt.saturating_add(1);
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanent_reasons() {
        assert!(!is_transient("invalid"));
        assert!(!is_transient("invalidQuery"));
        assert!(!is_transient("notImplemented"));
        assert!(is_transient("backendError"));
        assert!(is_transient("rateLimitExceeded"));
        assert!(is_transient(""));
    }

    #[test]
    fn test_should_retry() {
        assert!(should_retry(RetryStrategy::RetryAlways, "invalid"));
        assert!(!should_retry(RetryStrategy::RetryNever, "backendError"));
        assert!(should_retry(RetryStrategy::RetryOnTransientError, "backendError"));
        assert!(!should_retry(RetryStrategy::RetryOnTransientError, "invalid"));
    }

    #[test]
    fn test_base_delay_doubles_then_caps() {
        let backoff = Backoff::new(Duration::from_millis(200), Duration::from_secs(1));
        assert_eq!(backoff.base_delay(0), Duration::from_millis(200));
        assert_eq!(backoff.base_delay(1), Duration::from_millis(400));
        assert_eq!(backoff.base_delay(2), Duration::from_millis(800));
        assert_eq!(backoff.base_delay(3), Duration::from_secs(1));
        assert_eq!(backoff.base_delay(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_default_cap() {
        let backoff = Backoff::default();
        assert_eq!(backoff.base_delay(0), Duration::from_millis(200));
        assert_eq!(backoff.base_delay(40), Duration::from_secs(1500));
    }

    #[test]
    fn test_delay_fuzz_bounds() {
        let backoff = Backoff::new(Duration::from_secs(2), Duration::from_secs(60));
        assert_eq!(backoff.delay(0, 0.0), Duration::from_secs(1));
        assert_eq!(backoff.delay(0, 1.0), Duration::from_secs(2));
        assert_eq!(backoff.delay(0, 0.5), Duration::from_millis(1500));
    }

    #[test]
    fn test_intervals_within_bounds() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(2));
        for (attempt, delay) in backoff.intervals().take(20).enumerate() {
            let base = backoff.base_delay(attempt as u32);
            assert!(delay >= base.mul_f64(0.5));
            assert!(delay <= base);
        }
    }
}
