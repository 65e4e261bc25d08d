//! Non-starving priority-preferring atomic dequeue.

use deadpool_redis::Pool;

use crate::error::JobResult;
use crate::job::Job;
use crate::priority::Priority;
use crate::redis::brpoplpush;
use crate::schema::{processing_key, queue_key};

/// Emulates "blocking pop from the highest non-empty among N ordered
/// queues" on top of a primitive (`BRPOPLPUSH`) that only blocks on a
/// single key: iterate the priority ladder, trying each queue in turn with
/// a short per-queue timeout before advancing.
pub struct PriorityFetcher {
    pool: Pool,
    priorities: Vec<Priority>,
    poll_timeout_secs: f64,
}

impl PriorityFetcher {
    pub fn new(pool: Pool, priorities: Vec<Priority>, poll_timeout_secs: f64) -> Self {
        Self { pool, priorities, poll_timeout_secs }
    }

    /// Tries each priority queue in order, moving the popped job atomically
    /// into `processing:{worker_id}`. Returns `None` once every queue has
    /// missed once - the worker loop re-enters and tries again.
    pub async fn fetch(&self, worker_id: &str) -> JobResult<Option<Job>> {
        let dest = processing_key(worker_id);

        for priority in &self.priorities {
            let source = queue_key(priority);
            let mut conn = self.pool.get().await?;
            if let Some(bytes) = brpoplpush(&mut conn, &source, &dest, self.poll_timeout_secs).await? {
                return Ok(Some(Job::decode(&bytes)?));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_is_preserved() {
        let priorities = vec![Priority::high(), Priority::low()];
        assert_eq!(priorities[0].as_str(), "high");
        assert_eq!(priorities[1].as_str(), "low");
    }
}
