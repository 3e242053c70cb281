//! Async utilities
//!
//! Deadline handling shared by every call that leaves the process.

use crate::error::{DomusError, DomusResult, ErrorContext};
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

/// Run `future` under a deadline
///
/// An expired deadline becomes `DomusError::Timeout`; the future is dropped.
pub async fn with_timeout<F, T>(
    future: F,
    deadline: Duration,
    operation_name: &str,
) -> DomusResult<T>
where
    F: std::future::Future<Output = T>,
{
    match timeout(deadline, future).await {
        Ok(result) => Ok(result),
        Err(_) => {
            let duration_ms = deadline.as_millis() as u64;
            warn!(
                operation = operation_name,
                timeout_ms = duration_ms,
                "Operation exceeded its deadline"
            );
            Err(DomusError::Timeout {
                operation: operation_name.to_string(),
                duration_ms,
                context: ErrorContext::new("async_utils")
                    .with_operation("timeout")
                    .with_metadata("timeout_ms", &duration_ms.to_string())
                    .with_suggestion("Check network connectivity")
                    .with_suggestion("Verify service availability"),
            })
        }
    }
}

/// Like [`with_timeout`] for futures that already return a `DomusResult`
pub async fn with_deadline<F, T>(
    future: F,
    deadline: Duration,
    operation_name: &str,
) -> DomusResult<T>
where
    F: std::future::Future<Output = DomusResult<T>>,
{
    with_timeout(future, deadline, operation_name).await?
}
