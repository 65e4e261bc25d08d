//! Timeout wrapper for async operations.

use std::time::Duration;
use thiserror::Error;

/// Error returned when a timed operation exceeds its deadline.
#[derive(Debug, Error)]
#[error("operation timed out after {0:?}")]
pub struct TimeoutElapsed(pub Duration);

/// Wraps an async operation with a timeout, preserving the inner error type
/// for a success/failure within the deadline and surfacing `TimeoutElapsed`
/// only when the deadline itself is exceeded.
pub async fn with_timeout<F, Fut, T, E>(duration: Duration, f: F) -> Result<Result<T, E>, TimeoutElapsed>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    tokio::time::timeout(duration, f())
        .await
        .map_err(|_| TimeoutElapsed(duration))
}

/// Timeout configuration for the various call sites in the work queue.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout applied to a single job execution.
    pub job_timeout: Duration,
    /// Timeout applied to individual Redis round trips.
    pub redis_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            job_timeout: Duration::from_secs(30),
            redis_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_success() {
        let result = with_timeout(Duration::from_secs(1), || async { Ok::<_, String>(42) }).await;
        assert_eq!(result.unwrap().unwrap(), 42);
    }

    #[tokio::test]
    async fn test_timeout_inner_error_passes_through() {
        let result = with_timeout(Duration::from_secs(1), || async { Err::<i32, _>("boom".to_string()) }).await;
        assert_eq!(result.unwrap().unwrap_err(), "boom");
    }

    #[tokio::test]
    async fn test_timeout_exceeded() {
        let result = with_timeout(Duration::from_millis(10), || async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, String>(42)
        })
        .await;

        assert!(result.is_err());
    }
}
