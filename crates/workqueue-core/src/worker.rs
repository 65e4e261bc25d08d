//! Per-worker runtime loop: fetch, execute, heartbeat, retry/DLQ routing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use deadpool_redis::Pool;
use redis::AsyncCommands;
use tokio::sync::watch;
use tracing::{debug, error, info, warn, Instrument};

use workqueue_resilience::{with_timeout, CircuitBreaker, RetryPolicy};

use crate::error::JobError;
use crate::fetcher::PriorityFetcher;
use crate::job::Job;
use crate::metrics;
use crate::redis::push_then_remove;
use crate::schema::{heartbeat_key, processing_key, queue_key, COMPLETED_KEY, DEAD_LETTER_KEY};

/// Caller-defined job handler. Takes a decoded `Job`, returns `Ok(())` on
/// success or a classified `JobError` (`Transient`/`Poison`) on failure.
pub type JobHandler =
    Arc<dyn Fn(Job) -> Pin<Box<dyn Future<Output = Result<(), JobError>> + Send>> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub job_timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub heartbeat_interval: Duration,
    pub heartbeat_ttl: Duration,
    pub completed_trim: i64,
}

/// One worker's main loop. Multiple `WorkerRuntime`s (each with a distinct
/// `worker_id`) may run concurrently in the same process; the only shared
/// mutable state between them is the `CircuitBreaker`.
pub struct WorkerRuntime {
    config: WorkerConfig,
    pool: Pool,
    fetcher: PriorityFetcher,
    breaker: Arc<CircuitBreaker>,
    handler: JobHandler,
}

impl WorkerRuntime {
    pub fn new(config: WorkerConfig, pool: Pool, fetcher: PriorityFetcher, breaker: Arc<CircuitBreaker>, handler: JobHandler) -> Self {
        Self { config, pool, fetcher, breaker, handler }
    }

    /// Runs until `shutdown` is signalled. Cancellation translates into an
    /// immediate return between fetch attempts and after the in-flight job
    /// (if any) is fully resolved.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(worker_id = %self.config.worker_id, "worker runtime starting");

        loop {
            if *shutdown.borrow() {
                break;
            }

            if !self.breaker.is_call_permitted() {
                metrics::set_breaker_state(self.breaker.name(), self.breaker.state().as_u8());
                let wait = self.breaker.time_until_probe().unwrap_or(Duration::from_secs(1));
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = shutdown.changed() => { if *shutdown.borrow() { break; } }
                }
                continue;
            }

            let job = tokio::select! {
                result = self.fetcher.fetch(&self.config.worker_id) => result,
                _ = shutdown.changed() => { if *shutdown.borrow() { break; } else { continue; } }
            };

            let job = match job {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(e) => {
                    error!(worker_id = %self.config.worker_id, error = %e, "fetch failed, retrying shortly");
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    continue;
                }
            };

            self.process_one(job).await;
        }

        if let Err(e) = self.clear_heartbeat().await {
            warn!(worker_id = %self.config.worker_id, error = %e, "failed to clear heartbeat on shutdown");
        }
        info!(worker_id = %self.config.worker_id, "worker runtime stopped");
    }

    async fn process_one(&self, job: Job) {
        let span = tracing::info_span!("job", job_id = %job.id, priority = %job.priority, retries = job.retries);
        async {
            let heartbeat_stop = self.spawn_heartbeat();
            let started = Instant::now();

            let outcome = with_timeout(self.config.job_timeout, || {
                let handler = self.handler.clone();
                let job = job.clone();
                async move { handler(job).await }
            })
            .await;

            let _ = heartbeat_stop.send(true);
            let duration = started.elapsed();

            match outcome {
                Ok(Ok(())) => self.on_success(&job, duration).await,
                Ok(Err(err)) => self.on_failure(&job, err, duration).await,
                Err(_timeout) => self.on_failure(&job, JobError::Timeout, duration).await,
            }
        }
        .instrument(span)
        .await;
    }

    async fn on_success(&self, job: &Job, duration: Duration) {
        self.breaker.record_success();
        metrics::set_breaker_state(self.breaker.name(), self.breaker.state().as_u8());
        metrics::record_job_consumed(job.priority.as_str(), "completed");
        metrics::record_job_duration(job.priority.as_str(), "completed", duration);

        let processing = processing_key(&self.config.worker_id);
        let result: Result<(), JobError> = async {
            let payload = job.encode()?;
            let mut conn = self.pool.get().await?;
            let _: i64 = conn.lpush(COMPLETED_KEY, job.id.as_str()).await?;
            let _: () = conn.ltrim(COMPLETED_KEY, 0, self.config.completed_trim - 1).await?;
            crate::redis::remove_by_value(&mut conn, &processing, &payload).await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            error!(job_id = %job.id, error = %e, "failed to record job completion");
        } else {
            debug!(job_id = %job.id, ?duration, "job completed");
        }
    }

    async fn on_failure(&self, job: &Job, err: JobError, duration: Duration) {
        self.breaker.record_failure();
        metrics::set_breaker_state(self.breaker.name(), self.breaker.state().as_u8());
        let processing = processing_key(&self.config.worker_id);

        let exhausted = job.retries >= self.config.max_retries;
        let poison = err.is_poison();

        if poison || (err.is_transient() && exhausted) {
            metrics::record_job_consumed(job.priority.as_str(), "dead_lettered");
            metrics::record_job_duration(job.priority.as_str(), "dead_lettered", duration);
            warn!(job_id = %job.id, error = %err, retries = job.retries, "job moved to dead letter queue");

            let result: Result<(), JobError> = async {
                let payload = job.encode()?;
                let mut conn = self.pool.get().await?;
                push_then_remove(&mut conn, DEAD_LETTER_KEY, &processing, &payload).await?;
                Ok(())
            }
            .await;
            if let Err(e) = result {
                error!(job_id = %job.id, error = %e, "failed to dead-letter job");
            }
            return;
        }

        // Transient failure with retry budget remaining.
        metrics::record_job_consumed(job.priority.as_str(), "retried");
        metrics::record_job_duration(job.priority.as_str(), "retried", duration);
        metrics::record_retry(job.priority.as_str());

        let retry_policy = RetryPolicy {
            max_attempts: 1,
            initial_delay: self.config.backoff_base,
            max_delay: self.config.backoff_cap,
            multiplier: 2.0,
            jitter: true,
        };
        let backoff = retry_policy.delay_for_attempt(job.retries + 1);
        debug!(job_id = %job.id, error = %err, ?backoff, "transient failure, will retry");
        tokio::time::sleep(backoff).await;

        let retried_job = job.with_incremented_retries();
        let result: Result<(), JobError> = async {
            let original_payload = job.encode()?;
            let retried_payload = retried_job.encode()?;
            let mut conn = self.pool.get().await?;
            let queue = queue_key(&retried_job.priority);
            let _: i64 = conn.lpush(&queue, retried_payload).await?;
            crate::redis::remove_by_value(&mut conn, &processing, &original_payload).await?;
            Ok(())
        }
        .await;
        if let Err(e) = result {
            error!(job_id = %job.id, error = %e, "failed to requeue job after transient failure");
        }
    }

    /// Spawns a task that refreshes `heartbeat:{worker_id}` every
    /// `heartbeat_interval` until told to stop. The TTL is kept strictly
    /// greater than the refresh interval so a missed refresh or two doesn't
    /// make the Reaper think the worker is dead.
    fn spawn_heartbeat(&self) -> watch::Sender<bool> {
        let (tx, mut rx) = watch::channel(false);
        let pool = self.pool.clone();
        let key = heartbeat_key(&self.config.worker_id);
        let interval = self.config.heartbeat_interval;
        let ttl = self.config.heartbeat_ttl;

        tokio::spawn(async move {
            loop {
                if let Ok(mut conn) = pool.get().await {
                    let _: Result<(), _> = conn.set_ex::<_, _, ()>(&key, "1", ttl.as_secs().max(1)).await;
                }
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = rx.changed() => break,
                }
            }
        });

        tx
    }

    async fn clear_heartbeat(&self) -> Result<(), JobError> {
        let key = heartbeat_key(&self.config.worker_id);
        let mut conn = self.pool.get().await?;
        let _: () = conn.del(&key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_config_carries_expected_fields() {
        let cfg = WorkerConfig {
            worker_id: "w1".into(),
            job_timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_base: Duration::from_millis(500),
            backoff_cap: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(10),
            heartbeat_ttl: Duration::from_secs(30),
            completed_trim: 1000,
        };
        assert_eq!(cfg.worker_id, "w1");
        assert!(cfg.heartbeat_ttl > cfg.heartbeat_interval);
    }
}
