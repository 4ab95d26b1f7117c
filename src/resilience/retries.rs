//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a failed attempt is worth repeating
//! - Execute retries with exponential backoff + jitter
//! - Stamp the final error with the operation name and attempt count
//!
//! # Design Decisions
//! - Never retry 4xx-class provider rejections, validation or
//!   configuration errors, or the guard's own refusals
//! - Timeouts, transport errors and 5xx are retried
//! - Jittered backoff prevents synchronized retries across callers
//! - Intermediate failures are logged, not counted; only the terminal
//!   outcome reaches metrics and the circuit breaker

use std::future::Future;

use tokio::time::Instant;

use crate::error::GuardResult;
use crate::resilience::backoff::RetryPolicy;

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are exhausted.
///
/// `op` receives the 1-based attempt number.
pub async fn retry_with_backoff<T, F, Fut>(
    operation: &'static str,
    policy: &RetryPolicy,
    mut op: F,
) -> GuardResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = GuardResult<T>>,
{
    let max_attempts = policy.max_retries.max(1);
    let started = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(
                        operation,
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Recovered after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => {
                let err = err.for_operation(operation).with_attempts(attempt);

                if !err.is_retryable() || attempt >= max_attempts {
                    tracing::warn!(
                        operation,
                        attempt,
                        retryable = err.is_retryable(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        error = %err,
                        "Giving up"
                    );
                    return Err(err);
                }

                let delay = policy.delay_for(attempt);
                tracing::info!(
                    operation,
                    attempt,
                    delay = ?delay,
                    error = %err,
                    "Retrying after failure"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
