//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Jitter is drawn from `[0, JITTER_RATIO * delay]`.
pub const JITTER_RATIO: f64 = 0.1;

/// Retry configuration for one kind of provider call.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_retries: u32,

    /// Delay before the second attempt, in milliseconds.
    pub base_delay_ms: u64,

    /// Upper bound for any single delay, in milliseconds.
    pub max_delay_ms: u64,

    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self)
    }
}

/// Calculate exponential backoff delay with jitter.
///
/// `min(base * multiplier^(attempt-1) + jitter, max)`.
pub fn calculate_backoff(attempt: u32, policy: &RetryPolicy) -> Duration {
    let jitter_fraction = rand::thread_rng().gen_range(0.0..=JITTER_RATIO);
    backoff_with_jitter(attempt, policy, jitter_fraction)
}

/// Deterministic core of [`calculate_backoff`]; `jitter_fraction` is the
/// share of the exponential delay added on top.
pub fn backoff_with_jitter(attempt: u32, policy: &RetryPolicy, jitter_fraction: f64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let exponential = policy.base_delay_ms as f64 * policy.backoff_multiplier.powi(exponent);
    let jitter = exponential * jitter_fraction.clamp(0.0, JITTER_RATIO);
    let delay_ms = (exponential + jitter).min(policy.max_delay_ms as f64);

    Duration::from_millis(delay_ms.max(0.0).round() as u64)
}
