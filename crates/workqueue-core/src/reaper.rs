//! Detects dead workers (absent heartbeat) and requeues their in-flight
//! jobs without incrementing `retries`.

use std::time::Duration;

use deadpool_redis::Pool;
use redis::AsyncCommands;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::JobError;
use crate::job::Job;
use crate::schema::{queue_key, worker_id_from_processing_key, DEAD_LETTER_KEY, PROCESSING_SCAN_PATTERN};

#[derive(Debug, Clone)]
pub struct ReaperConfig {
    pub interval: Duration,
    /// Max number of `processing:*` keys inspected per SCAN round trip.
    pub scan_batch: usize,
}

pub struct Reaper {
    pool: Pool,
    config: ReaperConfig,
}

impl Reaper {
    pub fn new(pool: Pool, config: ReaperConfig) -> Self {
        Self { pool, config }
    }

    /// Runs one sweep over every `processing:*` list, returning the number
    /// of jobs recovered. Safe to call concurrently from multiple reaper
    /// instances: the push-then-LREM move is idempotent per job value.
    pub async fn sweep(&self) -> Result<u64, JobError> {
        let mut conn = self.pool.get().await?;
        let mut recovered = 0u64;
        let mut cursor: u64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(PROCESSING_SCAN_PATTERN)
                .arg("COUNT")
                .arg(self.config.scan_batch)
                .query_async(&mut *conn)
                .await?;

            for key in keys {
                recovered += self.reap_processing_list(&mut conn, &key).await?;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(recovered)
    }

    /// Spawns a periodic background sweep; returns once `shutdown` resolves.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            match self.sweep().await {
                Ok(n) if n > 0 => debug!(recovered = n, "reaper sweep recovered stale jobs"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "reaper sweep failed"),
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = shutdown.changed() => { if *shutdown.borrow() { break; } }
            }
        }
    }

    async fn reap_processing_list(&self, conn: &mut deadpool_redis::Connection, processing_key: &str) -> Result<u64, JobError> {
        let Some(worker_id) = worker_id_from_processing_key(processing_key) else {
            return Ok(0);
        };

        let heartbeat_key = crate::schema::heartbeat_key(worker_id);
        let alive: bool = conn.exists(&heartbeat_key).await?;
        if alive {
            return Ok(0);
        }

        let items: Vec<Vec<u8>> = conn.lrange(processing_key, 0, -1).await?;
        let mut recovered = 0u64;

        for payload in items {
            match Job::decode(&payload) {
                Ok(job) => {
                    let queue = queue_key(&job.priority);
                    let _: i64 = conn.lpush(&queue, &payload).await?;
                    let _: i64 = conn.lrem(processing_key, 1, &payload).await?;
                    warn!(job_id = %job.id, worker_id, "recovered job from dead worker");
                    recovered += 1;
                }
                Err(_) => {
                    let marker = json!({
                        "decode_error": true,
                        "source_worker": worker_id,
                        "raw": String::from_utf8_lossy(&payload),
                    });
                    let marker_bytes = serde_json::to_vec(&marker).map_err(|e| JobError::Internal(e.to_string()))?;
                    let _: i64 = conn.lpush(DEAD_LETTER_KEY, &marker_bytes).await?;
                    let _: i64 = conn.lrem(processing_key, 1, &payload).await?;
                    warn!(worker_id, "moved undecodable payload to dead letter queue");
                    recovered += 1;
                }
            }
        }

        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_worker_id_from_scan_result() {
        assert_eq!(worker_id_from_processing_key("processing:w-9"), Some("w-9"));
    }
}
