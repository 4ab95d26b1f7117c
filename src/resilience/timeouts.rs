//! Timeout enforcement.
//!
//! Every provider call has a deadline. Exceeding it drops the in-flight
//! future and yields a retryable `ExternalReason::Timeout`.

use std::future::Future;
use std::time::Duration;

use crate::error::{ExternalReason, GuardError, GuardResult};

/// Run `fut` with a deadline.
pub async fn with_timeout<T, Fut>(
    operation: &'static str,
    limit: Duration,
    fut: Fut,
) -> GuardResult<T>
where
    Fut: Future<Output = GuardResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, timeout_ms = limit.as_millis() as u64, "Provider call timed out");
            Err(GuardError::external(operation, ExternalReason::Timeout(limit)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_maps_to_external() {
        let result: GuardResult<()> = with_timeout("stk_push", Duration::from_secs(30), async {
            tokio::time::sleep(Duration::from_secs(31)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.reason(), Some(&ExternalReason::Timeout(Duration::from_secs(30))));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_fast_result_passes_through() {
        let result = with_timeout("stk_push", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
