//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound each upstream attempt by a fixed deadline
//! - Turn an elapsed deadline into a retryable `UpstreamError::Timeout`
//!
//! # Design Decisions
//! - Only the local wait is abandoned; the remote call may still complete
//!   server-side

use std::future::Future;
use std::time::Duration;

use crate::error::UpstreamError;

/// Run `fut`, failing with `UpstreamError::Timeout` if it exceeds `limit`.
pub async fn with_timeout<F, T>(limit: Duration, fut: F) -> Result<T, UpstreamError>
where
    F: Future<Output = Result<T, UpstreamError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(timeout_ms = limit.as_millis() as u64, "Upstream attempt timed out");
            Err(UpstreamError::Timeout(limit))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_deadline_is_timeout_error() {
        let result: Result<(), _> = with_timeout(Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(UpstreamError::Timeout(Duration::from_secs(1))));
    }

    #[tokio::test]
    async fn test_inner_result_passes_through() {
        let ok = with_timeout(Duration::from_secs(1), async { Ok::<_, UpstreamError>(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<(), _> = with_timeout(Duration::from_secs(1), async {
            Err(UpstreamError::Status { status: 503 })
        })
        .await;
        assert_eq!(err, Err(UpstreamError::Status { status: 503 }));
    }
}
