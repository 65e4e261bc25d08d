//! Work Queue - Redis-backed distributed work queue
//!
//! A filesystem producer walks a scan root and enqueues one job per file
//! onto a Redis priority queue. A pool of workers dequeues jobs with
//! priority preference, executes a caller-supplied handler with retry and
//! backoff, and routes exhausted/poison jobs to a dead letter queue. A
//! reaper recovers jobs owned by workers whose heartbeat has expired. A
//! circuit breaker gates worker fetches when the handler's failure ratio
//! crosses a threshold. An admin surface exposes stats, peek, and
//! destructive purge operations behind explicit confirmation.
//!
//! # Architecture
//!
//! ```text
//! Producer --> queue:{priority} --> Priority Fetcher --> Worker Runtime
//!                                                            |
//!                                              +-------------+-------------+
//!                                              |             |             |
//!                                          completed   queue:{priority}  dead_letter
//!                                                      (retry)
//!
//! Worker Runtime --> heartbeat:{worker_id}
//! Reaper watches heartbeat:* + processing:* and recovers stale jobs.
//! Circuit Breaker observes handler outcomes and gates further fetches.
//! ```

pub mod admin;
pub mod error;
pub mod fetcher;
pub mod job;
pub mod metrics;
pub mod priority;
pub mod producer;
pub mod rate_limiter;
pub mod reaper;
pub mod redis;
pub mod schema;
pub mod worker;

pub use admin::{Admin, Stats};
pub use error::{JobError, JobResult};
pub use fetcher::PriorityFetcher;
pub use job::{Job, JobId};
pub use priority::Priority;
pub use producer::{Producer, ProducerConfig};
pub use rate_limiter::RateLimiter;
pub use reaper::{Reaper, ReaperConfig};
pub use redis::{create_pool, RedisConnectionInfo};
pub use worker::{JobHandler, WorkerConfig, WorkerRuntime};

/// Re-export of the traits and types most call sites need.
pub mod prelude {
    pub use crate::error::{JobError, JobResult};
    pub use crate::job::{Job, JobId};
    pub use crate::priority::Priority;
}
