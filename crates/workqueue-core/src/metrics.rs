//! Prometheus metric names and recorders for the work queue.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the process-wide Prometheus recorder and registers metric
/// descriptions. Idempotent: later calls return the handle installed by the
/// first one. Call once at startup, before the first increment.
pub fn init_metrics() -> PrometheusHandle {
    let handle = PROMETHEUS_HANDLE
        .get_or_init(|| PrometheusBuilder::new().install_recorder().expect("failed to install prometheus recorder"))
        .clone();
    register_metrics();
    handle
}

/// The installed handle, if `init_metrics` has already run.
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

pub mod names {
    pub const JOBS_PRODUCED_TOTAL: &str = "jobs_produced_total";
    pub const JOBS_CONSUMED_TOTAL: &str = "jobs_consumed_total";
    pub const JOB_DURATION_SECONDS: &str = "job_duration_seconds";
    pub const QUEUE_LENGTH: &str = "queue_length";
    pub const WORKER_ACTIVE: &str = "worker_active";
    pub const BREAKER_STATE: &str = "breaker_state";
    pub const RETRIES_TOTAL: &str = "retries_total";
    pub const DLQ_SIZE: &str = "dlq_size";
}

/// Registers metric descriptions with the installed recorder. Call once at
/// startup, before the first increment.
pub fn register_metrics() {
    describe_counter!(names::JOBS_PRODUCED_TOTAL, "Total jobs enqueued by the producer");
    describe_counter!(names::JOBS_CONSUMED_TOTAL, "Total jobs popped off a priority queue by a worker");
    describe_histogram!(names::JOB_DURATION_SECONDS, "Handler execution duration in seconds");
    describe_gauge!(names::QUEUE_LENGTH, "Current length of a priority queue");
    describe_gauge!(names::WORKER_ACTIVE, "Number of workers with a live heartbeat");
    describe_gauge!(names::BREAKER_STATE, "Circuit breaker state: 0=closed, 1=open, 2=half_open");
    describe_counter!(names::RETRIES_TOTAL, "Total job retries performed");
    describe_gauge!(names::DLQ_SIZE, "Current length of the dead letter queue");
}

/// Records a successful enqueue.
pub fn record_job_produced(priority: &str) {
    counter!(names::JOBS_PRODUCED_TOTAL, "priority" => priority.to_string()).increment(1);
}

/// Records a job reaching a terminal (or retry) outcome for one attempt.
pub fn record_job_consumed(priority: &str, outcome: &str) {
    counter!(
        names::JOBS_CONSUMED_TOTAL,
        "priority" => priority.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_job_duration(priority: &str, outcome: &str, duration: Duration) {
    histogram!(
        names::JOB_DURATION_SECONDS,
        "priority" => priority.to_string(),
        "outcome" => outcome.to_string()
    )
    .record(duration.as_secs_f64());
}

pub fn set_queue_length(queue: &str, length: u64) {
    gauge!(names::QUEUE_LENGTH, "queue" => queue.to_string()).set(length as f64);
}

pub fn set_worker_active(count: u64) {
    gauge!(names::WORKER_ACTIVE).set(count as f64);
}

pub fn set_breaker_state(name: &str, state_value: u8) {
    gauge!(names::BREAKER_STATE, "breaker" => name.to_string()).set(state_value as f64);
}

pub fn record_retry(priority: &str) {
    counter!(names::RETRIES_TOTAL, "priority" => priority.to_string()).increment(1);
}

pub fn set_dlq_size(size: u64) {
    gauge!(names::DLQ_SIZE).set(size as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_does_not_panic_without_an_installed_recorder() {
        register_metrics();
        record_job_produced("high");
        record_job_consumed("high", "completed");
        record_job_duration("high", "completed", Duration::from_millis(5));
        set_queue_length("queue:high", 3);
        set_worker_active(2);
        set_breaker_state("default", 0);
        record_retry("low");
        set_dlq_size(0);
    }
}
