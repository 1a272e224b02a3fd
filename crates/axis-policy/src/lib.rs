pub mod backoff;
pub mod classify;
pub mod risk;

pub use backoff::{delay_ms, should_retry, BackoffConfig, RandomSource, RetryDecision, SystemRandom};
pub use classify::{classify_error, ErrorClass};
pub use risk::{classify_steps, overall_risk};
