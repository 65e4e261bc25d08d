//! Typed configuration tree.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub redis: RedisSettings,
    #[serde(default)]
    pub producer: ProducerSettings,
    #[serde(default)]
    pub worker: WorkerSettings,
    #[serde(default)]
    pub reaper: ReaperSettings,
    #[serde(default)]
    pub breaker: BreakerSettings,
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis: RedisSettings::default(),
            producer: ProducerSettings::default(),
            worker: WorkerSettings::default(),
            reaper: ReaperSettings::default(),
            breaker: BreakerSettings::default(),
            observability: ObservabilitySettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    /// `redis://host:port` - no sensible default, must be set explicitly.
    pub address: Option<String>,
    #[serde(default)]
    pub db: u8,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self { address: None, db: 0, password: None, pool_size: default_pool_size() }
    }
}

fn default_pool_size() -> usize {
    16
}

impl RedisSettings {
    /// Builds the `redis://` URL the `redis`/`deadpool-redis` client expects,
    /// folding in `db` and `password` if present.
    pub fn connection_url(&self) -> Option<String> {
        let address = self.address.as_ref()?;
        let stripped = address.trim_start_matches("redis://");
        let auth = self.password.as_deref().map(|p| format!(":{p}@")).unwrap_or_default();
        Some(format!("redis://{auth}{stripped}/{}", self.db))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerSettings {
    #[serde(default = "default_scan_dir")]
    pub scan_dir: String,
    #[serde(default)]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub high_priority_extensions: Vec<String>,
    #[serde(default = "default_priority")]
    pub default_priority: String,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_sec: u64,
    #[serde(default = "default_rate_limit_key")]
    pub rate_limit_key: String,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            scan_dir: default_scan_dir(),
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            high_priority_extensions: Vec::new(),
            default_priority: default_priority(),
            rate_limit_per_sec: default_rate_limit(),
            rate_limit_key: default_rate_limit_key(),
        }
    }
}

fn default_scan_dir() -> String {
    ".".to_string()
}
fn default_priority() -> String {
    "low".to_string()
}
fn default_rate_limit() -> u64 {
    100
}
fn default_rate_limit_key() -> String {
    "rate_limit:producer".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    #[serde(default = "default_worker_count")]
    pub count: usize,
    /// Optional band -> Redis key override; the schema already derives
    /// `queue:{band}` from `priorities`, so this is informational unless an
    /// operator needs a non-default key layout.
    #[serde(default)]
    pub queues: HashMap<String, String>,
    #[serde(default = "default_priorities")]
    pub priorities: Vec<String>,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: f64,
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_heartbeat_ttl_secs")]
    pub heartbeat_ttl_secs: u64,
    #[serde(default = "default_completed_trim")]
    pub completed_trim: i64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            queues: HashMap::new(),
            priorities: default_priorities(),
            poll_timeout_secs: default_poll_timeout_secs(),
            job_timeout_secs: default_job_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            heartbeat_ttl_secs: default_heartbeat_ttl_secs(),
            completed_trim: default_completed_trim(),
        }
    }
}

fn default_worker_count() -> usize {
    4
}
fn default_priorities() -> Vec<String> {
    vec!["high".to_string(), "low".to_string()]
}
fn default_poll_timeout_secs() -> f64 {
    1.0
}
fn default_job_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
// Documented default per DESIGN.md: chosen between the teacher's
// RetryPolicy::exponential default and stream-worker's transient-error default.
fn default_backoff_base_ms() -> u64 {
    500
}
fn default_backoff_cap_ms() -> u64 {
    30_000
}
fn default_heartbeat_interval_secs() -> u64 {
    10
}
fn default_heartbeat_ttl_secs() -> u64 {
    30
}
fn default_completed_trim() -> i64 {
    1000
}

impl WorkerSettings {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
    pub fn heartbeat_ttl(&self) -> Duration {
        Duration::from_secs(self.heartbeat_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaperSettings {
    #[serde(default = "default_reaper_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_reaper_batch")]
    pub batch: usize,
}

impl Default for ReaperSettings {
    fn default() -> Self {
        Self { interval_secs: default_reaper_interval_secs(), batch: default_reaper_batch() }
    }
}

fn default_reaper_interval_secs() -> u64 {
    15
}
fn default_reaper_batch() -> usize {
    100
}

impl ReaperSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSettings {
    #[serde(default = "default_breaker_window")]
    pub window: usize,
    #[serde(default = "default_breaker_threshold")]
    pub threshold: f64,
    #[serde(default = "default_breaker_min_samples")]
    pub min_samples: usize,
    #[serde(default = "default_breaker_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Number of probe calls admitted while half-open; the breaker always
    /// uses a single probe, so this is fixed at 1 rather than configurable.
    #[serde(default = "default_breaker_probe")]
    pub probe: usize,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            window: default_breaker_window(),
            threshold: default_breaker_threshold(),
            min_samples: default_breaker_min_samples(),
            cooldown_secs: default_breaker_cooldown_secs(),
            probe: default_breaker_probe(),
        }
    }
}

fn default_breaker_window() -> usize {
    20
}
fn default_breaker_threshold() -> f64 {
    0.5
}
fn default_breaker_min_samples() -> usize {
    10
}
fn default_breaker_cooldown_secs() -> u64 {
    30
}
fn default_breaker_probe() -> usize {
    1
}

impl BreakerSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_health_port")]
    pub health_port: u16,
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            metrics_port: default_metrics_port(),
            health_port: default_health_port(),
            log_format: default_log_format(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9000
}
fn default_health_port() -> u16 {
    9001
}
fn default_log_format() -> String {
    "auto".to_string()
}
