//! Structured logging initialization.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global tracing subscriber. `format` is one of
/// `"auto"` (JSON when `WORKQUEUE_ENV=production`, pretty otherwise),
/// `"pretty"`, or `"json"`. The level is controlled by `RUST_LOG` with a
/// default of `info` when unset.
pub fn init_logging(format: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let use_json = resolve_json(format, std::env::var("WORKQUEUE_ENV").ok().as_deref());

    let registry = tracing_subscriber::registry().with(env_filter);

    if use_json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().pretty().with_target(true)).init();
    }
}

fn resolve_json(format: &str, env: Option<&str>) -> bool {
    match format {
        "json" => true,
        "pretty" => false,
        _ => env == Some("production"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_format_wins_over_environment() {
        assert!(resolve_json("json", Some("development")));
        assert!(!resolve_json("pretty", Some("production")));
    }

    #[test]
    fn auto_follows_environment() {
        assert!(resolve_json("auto", Some("production")));
        assert!(!resolve_json("auto", Some("development")));
        assert!(!resolve_json("auto", None));
    }
}
