//! Layered YAML + environment-variable configuration loader.

use std::path::Path;

use config::{Config, Environment, File};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::types::AppConfig;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration error: {0}")]
    Source(#[from] config::ConfigError),
    #[error("configuration error: {0}")]
    Invalid(String),
}

/// Loads `AppConfig` from the YAML file at `path`, with environment
/// variables prefixed `WORKQUEUE__` (double-underscore separated, e.g.
/// `WORKQUEUE__REDIS__ADDRESS`) taking precedence over the file. Validates
/// cross-field constraints the type system can't express and fails fast
/// with a descriptive error on any violation.
pub fn load(path: impl AsRef<Path>) -> Result<AppConfig, ConfigLoadError> {
    let path = path.as_ref();

    if let Err(e) = dotenvy::dotenv() {
        debug!("no .env file found or error loading it: {e}");
    }

    let mut builder = Config::builder();

    if path.exists() {
        debug!(path = %path.display(), "loading config file");
        builder = builder.add_source(File::from(path).required(true));
    } else {
        return Err(ConfigLoadError::Invalid(format!("config file not found: {}", path.display())));
    }

    builder = builder.add_source(Environment::with_prefix("WORKQUEUE").separator("__").try_parsing(true));

    let config = builder.build()?;
    let app_config: AppConfig = config.try_deserialize()?;

    validate(&app_config)?;
    info!("configuration loaded");

    Ok(app_config)
}

fn validate(config: &AppConfig) -> Result<(), ConfigLoadError> {
    if config.redis.address.as_deref().map(str::is_empty).unwrap_or(true) {
        return Err(ConfigLoadError::Invalid("redis.address is required".into()));
    }

    if config.worker.priorities.is_empty() {
        return Err(ConfigLoadError::Invalid("worker.priorities must contain at least one band".into()));
    }

    if config.worker.backoff_base_ms > config.worker.backoff_cap_ms {
        return Err(ConfigLoadError::Invalid("worker.backoff_base must be <= worker.backoff_cap".into()));
    }

    if config.breaker.min_samples > config.breaker.window {
        return Err(ConfigLoadError::Invalid("breaker.min_samples must be <= breaker.window".into()));
    }

    if !(0.0..=1.0).contains(&config.breaker.threshold) {
        return Err(ConfigLoadError::Invalid("breaker.threshold must be between 0.0 and 1.0".into()));
    }

    if config.producer.rate_limit_per_sec == 0 {
        warn!("producer.rate_limit_per_sec is 0: the producer will never enqueue a job");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_yaml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn fills_in_defaults_for_missing_fields() {
        let file = write_temp_yaml("redis:\n  address: \"localhost:6379\"\n");
        let config = load(file.path()).unwrap();
        assert_eq!(config.worker.count, 4);
        assert_eq!(config.worker.priorities, vec!["high".to_string(), "low".to_string()]);
        assert_eq!(config.observability.metrics_port, 9000);
    }

    #[test]
    fn missing_redis_address_is_rejected() {
        let file = write_temp_yaml("worker:\n  count: 2\n");
        let err = load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Invalid(_)));
    }

    #[test]
    fn empty_priorities_list_is_rejected() {
        let file = write_temp_yaml("redis:\n  address: \"localhost:6379\"\nworker:\n  priorities: []\n");
        let err = load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Invalid(_)));
    }

    #[test]
    fn backoff_base_above_cap_is_rejected() {
        let file = write_temp_yaml(
            "redis:\n  address: \"localhost:6379\"\nworker:\n  backoff_base_ms: 50000\n  backoff_cap_ms: 1000\n",
        );
        let err = load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Invalid(_)));
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let err = load("/nonexistent/path/config.yaml").unwrap_err();
        assert!(matches!(err, ConfigLoadError::Invalid(_)));
    }

    #[test]
    fn env_override_takes_precedence_over_file() {
        let file = write_temp_yaml("redis:\n  address: \"localhost:6379\"\nworker:\n  count: 2\n");
        std::env::set_var("WORKQUEUE__WORKER__COUNT", "9");
        let config = load(file.path()).unwrap();
        std::env::remove_var("WORKQUEUE__WORKER__COUNT");
        assert_eq!(config.worker.count, 9);
    }
}
