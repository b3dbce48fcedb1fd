//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

use crate::config::RetryConfig;

/// Delay schedule between retry attempts.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Delay to wait after the given failed attempt (1-based).
    ///
    /// Doubles from `base` per attempt, capped at `max`, plus up to 10%
    /// jitter so concurrent callers do not retry in lockstep.
    pub fn delay(&self, attempt: u32) -> Duration {
        let capped = self.ceiling(attempt);
        let jitter_range = capped.as_millis() as u64 / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };
        capped + Duration::from_millis(jitter)
    }

    /// Delay without jitter.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        self.base.saturating_mul(factor).min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_and_caps() {
        let backoff = Backoff::new(Duration::from_millis(500), Duration::from_millis(4000));
        assert_eq!(backoff.ceiling(0), Duration::ZERO);
        assert_eq!(backoff.ceiling(1), Duration::from_millis(500));
        assert_eq!(backoff.ceiling(2), Duration::from_millis(1000));
        assert_eq!(backoff.ceiling(4), Duration::from_millis(4000));
        assert_eq!(backoff.ceiling(40), Duration::from_millis(4000));
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(2000));
        for attempt in 1..6 {
            let ceiling = backoff.ceiling(attempt);
            let delay = backoff.delay(attempt);
            assert!(delay >= ceiling);
            assert!(delay <= ceiling + ceiling / 10);
        }
    }
}
