//! Fixed-window-per-second rate limiter for the Producer, shared across
//! producer processes via a single Redis counter.
//!
//! A per-process token bucket (like the teacher's `governor`-based limiter
//! in `workqueue-resilience`) can't enforce a cross-process limit, so this
//! lives here instead and talks to Redis directly.

use deadpool_redis::Pool;
use rand::Rng;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

use crate::error::JobResult;
use crate::schema::RATE_LIMIT_PRODUCER_KEY;

/// Fixed-window rate limiter backed by a Redis INCR+PEXPIRE counter.
pub struct RateLimiter {
    pool: Pool,
    key: String,
    limit_per_sec: u64,
}

impl RateLimiter {
    pub fn new(pool: Pool, key: impl Into<String>, limit_per_sec: u64) -> Self {
        Self { pool, key: key.into(), limit_per_sec }
    }

    pub fn with_default_key(pool: Pool, limit_per_sec: u64) -> Self {
        Self::new(pool, RATE_LIMIT_PRODUCER_KEY, limit_per_sec)
    }

    /// Blocks until a slot in the current (or a future) one-second window
    /// is available. Jitter on the retry sleep prevents every producer
    /// process waking up for the next window at exactly the same instant.
    pub async fn acquire(&self) -> JobResult<()> {
        loop {
            let mut conn = self.pool.get().await?;
            let count: u64 = conn.incr(&self.key, 1u64).await?;
            if count == 1 {
                let _: () = conn.pexpire(&self.key, 1000).await?;
            }

            if count <= self.limit_per_sec {
                return Ok(());
            }

            let ttl_ms: i64 = conn.pttl(&self.key).await?;
            let ttl_ms = ttl_ms.max(0) as u64;
            let jitter_ms: u64 = rand::thread_rng().gen_range(0..=50);
            debug!(key = %self.key, count, limit = self.limit_per_sec, ttl_ms, "rate limit exceeded, backing off");
            tokio::time::sleep(Duration::from_millis(ttl_ms + jitter_ms)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_key_matches_schema() {
        // Constructing a RateLimiter doesn't require a live pool until acquire() is called,
        // but Pool::builder needs a valid-looking URL; exercise just the key wiring here.
        assert_eq!(RATE_LIMIT_PRODUCER_KEY, "rate_limit:producer");
    }
}
