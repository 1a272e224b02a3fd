//! Exponential backoff with jitter, and the `shouldRetry` decision (spec
//! §4.7 "Backoff"). Grounded on the delayed-vs-immediate shape of
//! `other_examples` golem-cloud's `RecoveryDecision`, generalized to a
//! single retry/delay decision per attempt rather than a scheduled task.

use crate::classify::{classify_error, ErrorClass};
use serde_json::Value;

/// Injectable source of a `[0, 1)` random float, so backoff delay is
/// exactly reproducible in tests (spec §4.7 "The random source is
/// injectable for testability").
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

/// The default source, backed by the process RNG.
pub struct SystemRandom;

impl RandomSource for SystemRandom {
    fn next_unit(&mut self) -> f64 {
        rand::random::<f64>()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub cap_ms: u64,
    pub jitter_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self { base_ms: 1000, cap_ms: 30_000, jitter_ms: 1000 }
    }
}

/// `delay(attempt) = min(baseMs * 2^attempt, capMs) + floor(rand01 * jitterMs)`.
pub fn delay_ms(config: BackoffConfig, attempt: u32, random: &mut impl RandomSource) -> u64 {
    let exponential = config.base_ms.saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX).max(1));
    let capped = exponential.min(config.cap_ms);
    let jitter = (random.next_unit() * config.jitter_ms as f64).floor() as u64;
    capped + jitter
}

#[derive(Clone, Debug, PartialEq)]
pub struct RetryDecision {
    pub should_retry: bool,
    pub delay_ms: u64,
    pub classified: ErrorClass,
}

/// `shouldRetry(error, attempt, maxAttempts)` (spec §4.7): retries only
/// if classification is `retriable` and `attempt + 1 < maxAttempts`.
pub fn should_retry(
    error: &Value,
    attempt: u32,
    max_attempts: u32,
    config: BackoffConfig,
    random: &mut impl RandomSource,
) -> RetryDecision {
    let classified = classify_error(error);
    let should_retry = classified.is_retriable() && attempt + 1 < max_attempts;
    let delay_ms = if should_retry { delay_ms(config, attempt, random) } else { 0 };

    RetryDecision { should_retry, delay_ms, classified }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedRandom(f64);

    impl RandomSource for FixedRandom {
        fn next_unit(&mut self) -> f64 {
            self.0
        }
    }

    #[test]
    fn delay_grows_exponentially_until_the_cap() {
        let config = BackoffConfig::default();
        let mut random = FixedRandom(0.0);
        assert_eq!(delay_ms(config, 0, &mut random), 1000);
        assert_eq!(delay_ms(config, 1, &mut random), 2000);
        assert_eq!(delay_ms(config, 2, &mut random), 4000);
        assert_eq!(delay_ms(config, 10, &mut random), 30_000);
    }

    #[test]
    fn jitter_is_added_and_floored() {
        let config = BackoffConfig::default();
        let mut random = FixedRandom(0.999);
        assert_eq!(delay_ms(config, 0, &mut random), 1000 + 999);
    }

    #[test]
    fn delay_bounds_hold_for_a_range_of_attempts() {
        let config = BackoffConfig::default();
        let mut random = FixedRandom(0.5);
        for attempt in 0..20 {
            let delay = delay_ms(config, attempt, &mut random);
            let expected_floor = config.base_ms.saturating_mul(2u64.saturating_pow(attempt)).min(config.cap_ms);
            assert!(delay >= expected_floor);
            assert!(delay <= config.cap_ms + config.jitter_ms);
        }
    }

    #[test]
    fn retriable_error_under_attempt_budget_retries() {
        let mut random = FixedRandom(0.0);
        let decision = should_retry(&json!({"status": 503}), 0, 3, BackoffConfig::default(), &mut random);
        assert!(decision.should_retry);
        assert_eq!(decision.classified, ErrorClass::Retriable);
    }

    #[test]
    fn retriable_error_at_final_attempt_does_not_retry() {
        let mut random = FixedRandom(0.0);
        let decision = should_retry(&json!({"status": 503}), 1, 2, BackoffConfig::default(), &mut random);
        assert!(!decision.should_retry);
        assert_eq!(decision.delay_ms, 0);
    }

    #[test]
    fn non_retriable_error_never_retries_regardless_of_attempt_budget() {
        let mut random = FixedRandom(0.0);
        let decision = should_retry(&json!({"status": 403}), 0, 5, BackoffConfig::default(), &mut random);
        assert!(!decision.should_retry);
        assert_eq!(decision.classified, ErrorClass::NonRetriableCredential);
    }
}
