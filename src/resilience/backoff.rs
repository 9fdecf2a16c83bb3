//! Exponential backoff with jitter between backend attempts.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Delay schedule shared by every route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl BackoffPolicy {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms: max_delay_ms.max(base_delay_ms),
        }
    }

    /// No delay between attempts.
    pub fn immediate() -> Self {
        Self::new(0, 0)
    }

    /// Delay before retry number `retry` (1-based): base * 2^(retry-1),
    /// capped at the maximum, plus up to 10% jitter.
    pub fn delay(&self, retry: u32) -> Duration {
        if retry == 0 || self.base_delay_ms == 0 {
            return Duration::ZERO;
        }

        let exponential_base = 2u64.saturating_pow(retry - 1);
        let capped_delay = self
            .base_delay_ms
            .saturating_mul(exponential_base)
            .min(self.max_delay_ms);

        let jitter_range = capped_delay / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped_delay + jitter)
    }

    /// Upper bound on the summed delays of `retries` retries, jitter included.
    pub fn worst_case_total(&self, retries: u32) -> Duration {
        if self.base_delay_ms == 0 {
            return Duration::ZERO;
        }

        let mut total: u64 = 0;
        for retry in 1..=retries {
            let capped_delay = self
                .base_delay_ms
                .saturating_mul(2u64.saturating_pow(retry - 1))
                .min(self.max_delay_ms);
            let ceiling = capped_delay.saturating_add(capped_delay / 10);
            if capped_delay == self.max_delay_ms {
                let remaining = u64::from(retries - retry + 1);
                total = total.saturating_add(remaining.saturating_mul(ceiling));
                break;
            }
            total = total.saturating_add(ceiling);
        }

        Duration::from_millis(total)
    }
}

impl From<&RetryConfig> for BackoffPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.base_delay_ms, config.max_delay_ms)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_until_cap() {
        let policy = BackoffPolicy::new(100, 1000);

        let first = policy.delay(1).as_millis();
        assert!((100..110).contains(&first));

        let second = policy.delay(2).as_millis();
        assert!((200..220).contains(&second));

        let capped = policy.delay(10).as_millis();
        assert!((1000..1100).contains(&capped));
    }

    #[test]
    fn test_immediate_policy() {
        let policy = BackoffPolicy::immediate();
        assert_eq!(policy.delay(1), Duration::ZERO);
        assert_eq!(policy.delay(5), Duration::ZERO);
    }

    #[test]
    fn test_huge_retry_count_saturates() {
        let policy = BackoffPolicy::new(50, 400);
        assert!(policy.delay(u32::MAX).as_millis() < 440);
    }

    #[test]
    fn test_worst_case_total_bounds_every_delay() {
        let policy = BackoffPolicy::new(100, 300);
        // 100 + 200 + 300 + 300, each with its 10% jitter ceiling.
        assert_eq!(policy.worst_case_total(4), Duration::from_millis(990));
        assert_eq!(policy.worst_case_total(0), Duration::ZERO);

        let observed: Duration = (1..=4).map(|retry| policy.delay(retry)).sum();
        assert!(observed <= policy.worst_case_total(4));

        assert_eq!(BackoffPolicy::immediate().worst_case_total(10), Duration::ZERO);
        assert!(BackoffPolicy::new(50, 400).worst_case_total(u32::MAX) > Duration::ZERO);
    }
}
