//! Work queue error types.

use thiserror::Error;

/// Result type for work queue operations.
pub type JobResult<T> = Result<T, JobError>;

/// Work queue errors.
#[derive(Debug, Error)]
pub enum JobError {
    /// Filesystem scan failed (unreadable root, permission denied, ...).
    #[error("scan error: {0}")]
    Scan(String),

    /// Job handler reported a failure that may succeed on retry.
    #[error("transient handler failure: {0}")]
    Transient(String),

    /// Job handler reported a failure that must never be retried.
    #[error("poison job: {0}")]
    Poison(String),

    /// Handler did not finish within the configured job timeout.
    #[error("job timed out")]
    Timeout,

    /// Job payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Redis connection pool error.
    #[error("redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An admin operation was refused because required safety flags were absent.
    #[error("refused: {0}")]
    Refused(String),

    /// Anything else that doesn't fit a classified kind above.
    #[error("internal error: {0}")]
    Internal(String),
}

impl JobError {
    /// Whether the failure should be retried (subject to the retry budget).
    pub fn is_transient(&self) -> bool {
        matches!(self, JobError::Transient(_) | JobError::Timeout | JobError::Redis(_) | JobError::Pool(_))
    }

    /// Whether the failure must bypass the retry budget entirely.
    pub fn is_poison(&self) -> bool {
        matches!(self, JobError::Poison(_) | JobError::Decode(_))
    }
}
