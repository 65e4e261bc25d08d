//! Redis connection pool and the low-level atomic-move primitives every
//! other module (fetcher, worker, reaper) builds on.

use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use tracing::info;

use crate::error::{JobError, JobResult};

/// Connection parameters. Owned by `workqueue-config`; this crate only
/// consumes the resolved URL and pool size.
#[derive(Debug, Clone)]
pub struct RedisConnectionInfo {
    pub url: String,
    pub pool_size: usize,
}

/// Creates and validates a Redis connection pool.
pub async fn create_pool(info: &RedisConnectionInfo) -> JobResult<Pool> {
    let cfg = Config::from_url(&info.url);
    let pool = cfg
        .builder()
        .map_err(|e| JobError::Configuration(format!("invalid redis url: {e}")))?
        .max_size(info.pool_size)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| JobError::Configuration(format!("failed to build redis pool: {e}")))?;

    let mut conn = pool.get().await?;
    redis::cmd("PING").query_async::<String>(&mut *conn).await?;
    info!(pool_size = info.pool_size, "redis connection pool ready");

    Ok(pool)
}

/// Atomically moves one job from the tail of `source` onto the head of
/// `dest`, blocking up to `timeout_secs`. Returns `None` on timeout.
///
/// This is the single move the whole crash-safety story rests on: the job
/// is never observable in neither list, so a crash between the two halves
/// of a naive pop-then-push can't lose it.
pub async fn brpoplpush(
    conn: &mut deadpool_redis::Connection,
    source: &str,
    dest: &str,
    timeout_secs: f64,
) -> JobResult<Option<Vec<u8>>> {
    let result: Option<Vec<u8>> = redis::cmd("BRPOPLPUSH")
        .arg(source)
        .arg(dest)
        .arg(timeout_secs)
        .query_async(conn)
        .await?;
    Ok(result)
}

/// Pushes `payload` onto the head of `dest`, then removes the first
/// occurrence of `payload` from `source`. Used for processing -> queue/dlq/
/// completed moves, where by-value removal (not popping) is required
/// because the source list isn't guaranteed to still hold the item at its
/// original position.
pub async fn push_then_remove(
    conn: &mut deadpool_redis::Connection,
    dest: &str,
    source: &str,
    payload: &[u8],
) -> JobResult<()> {
    let _: i64 = conn.lpush(dest, payload).await?;
    let _: i64 = conn.lrem(source, 1, payload).await?;
    Ok(())
}

/// Removes the first occurrence of `payload` from `list` without pushing
/// anywhere else (the success path: the job is already in `completed`'s
/// id-only form, or simply discarded).
pub async fn remove_by_value(conn: &mut deadpool_redis::Connection, list: &str, payload: &[u8]) -> JobResult<()> {
    let _: i64 = conn.lrem(list, 1, payload).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_info_carries_pool_size() {
        let info = RedisConnectionInfo { url: "redis://localhost".into(), pool_size: 8 };
        assert_eq!(info.pool_size, 8);
    }
}
