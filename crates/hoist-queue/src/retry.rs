use std::time::Duration;

use crate::config::QueueConfig;
use crate::error::ItemError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub auto_retry: bool,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            auto_retry: config.auto_retry,
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// Automatic retry: enabled, transient error, retries left.
    pub fn should_retry(&self, retry_count: u32, error: &ItemError) -> bool {
        self.auto_retry && error.is_retryable() && !self.is_exhausted(retry_count)
    }

    /// `base * 2^retry_count`, capped at `max_delay`.
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        let factor = 1u32.checked_shl(retry_count).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            auto_retry: true,
            max_retries: 2,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
        }
    }

    #[test]
    fn exponential_then_capped() {
        let p = policy();
        assert_eq!(p.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(p.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(p.backoff_delay(3), Duration::from_millis(800));
        assert_eq!(p.backoff_delay(4), Duration::from_secs(1));
        assert_eq!(p.backoff_delay(40), Duration::from_secs(1));
    }

    #[test]
    fn only_transient_errors_retry() {
        let p = policy();
        assert!(p.should_retry(0, &ItemError::transient("503")));
        assert!(!p.should_retry(0, &ItemError::validation("no scope")));
        assert!(!p.should_retry(0, &ItemError::reconciliation("gone")));
    }

    #[test]
    fn retries_stop_at_max() {
        let p = policy();
        let err = ItemError::transient("reset");
        assert!(p.should_retry(1, &err));
        assert!(!p.should_retry(2, &err));
        assert!(p.is_exhausted(2));
    }

    #[test]
    fn disabled_auto_retry_never_retries() {
        let p = RetryPolicy {
            auto_retry: false,
            ..policy()
        };
        assert!(!p.should_retry(0, &ItemError::transient("503")));
    }

    proptest! {
        #[test]
        fn backoff_is_monotonic_and_capped(n in 0u32..64) {
            let p = policy();
            prop_assert!(p.backoff_delay(n) <= p.max_delay);
            prop_assert!(p.backoff_delay(n) <= p.backoff_delay(n + 1));
        }
    }
}
