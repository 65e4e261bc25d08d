//! Configuration loading and logging setup for the work queue binary.

pub mod loader;
pub mod logging;
pub mod types;

pub use loader::{load, ConfigLoadError};
pub use logging::init_logging;
pub use types::{AppConfig, BreakerSettings, ObservabilitySettings, ProducerSettings, ReaperSettings, RedisSettings, WorkerSettings};
