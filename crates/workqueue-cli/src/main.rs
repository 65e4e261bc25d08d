//! Role-dispatch entry point: `producer`, `worker`, `all`, or `admin`.

mod cli;
mod handler;
mod health;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use cli::{AdminArgs, AdminCmd, Cli, Role, EXIT_CONFIGURATION, EXIT_REFUSED, EXIT_RUNTIME, EXIT_SUCCESS};
use workqueue_config::{load, AppConfig};
use workqueue_core::{
    create_pool, Admin, JobError, Priority, PriorityFetcher, Producer, ProducerConfig, RateLimiter, Reaper,
    ReaperConfig, RedisConnectionInfo, WorkerConfig, WorkerRuntime,
};
use workqueue_resilience::{CircuitBreaker, CircuitBreakerConfig};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    std::process::exit(run(cli).await);
}

async fn run(cli: Cli) -> i32 {
    let config = match load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return EXIT_CONFIGURATION;
        }
    };

    workqueue_config::init_logging(&config.observability.log_format);
    info!(version = env!("CARGO_PKG_VERSION"), role = ?cli.role, "starting workqueue");
    workqueue_core::metrics::init_metrics();

    let redis_info = match redis_connection_info(&config) {
        Ok(info) => info,
        Err(e) => {
            error!(error = %e, "invalid redis configuration");
            return EXIT_CONFIGURATION;
        }
    };

    let pool = match create_pool(&redis_info).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "failed to connect to redis");
            return EXIT_RUNTIME;
        }
    };

    match cli.role {
        Role::Producer => run_producer(pool, &config).await,
        Role::Worker => run_worker_and_reaper(pool, &config).await,
        Role::All => run_all(pool, &config).await,
        Role::Admin => run_admin(pool, &config, &cli.admin).await,
    }
}

fn redis_connection_info(config: &AppConfig) -> Result<RedisConnectionInfo, String> {
    let url = config.redis.connection_url().ok_or_else(|| "redis.address is required".to_string())?;
    Ok(RedisConnectionInfo { url, pool_size: config.redis.pool_size })
}

fn priorities_from_config(config: &AppConfig) -> Vec<Priority> {
    config.worker.priorities.iter().map(|p| Priority::new(p.clone())).collect()
}

async fn run_producer(pool: deadpool_redis::Pool, config: &AppConfig) -> i32 {
    let limiter = RateLimiter::new(pool.clone(), config.producer.rate_limit_key.clone(), config.producer.rate_limit_per_sec);
    let producer_config = ProducerConfig {
        scan_dir: PathBuf::from(&config.producer.scan_dir),
        include_globs: config.producer.include_globs.clone(),
        exclude_globs: config.producer.exclude_globs.clone(),
        high_priority_extensions: config.producer.high_priority_extensions.clone(),
        default_priority: Priority::new(config.producer.default_priority.clone()),
        rate_limit_per_sec: config.producer.rate_limit_per_sec,
    };

    let producer = match Producer::new(pool, producer_config, limiter) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "failed to build producer");
            return EXIT_CONFIGURATION;
        }
    };

    match producer.run(&uuid::Uuid::new_v4().simple().to_string()).await {
        Ok(enqueued) => {
            info!(enqueued, "producer scan complete");
            EXIT_SUCCESS
        }
        Err(e) => {
            error!(error = %e, "producer scan failed");
            EXIT_RUNTIME
        }
    }
}

/// Builds the worker pool, reaper, and health/metrics server and runs them
/// until a shutdown signal arrives. Shared by the `worker` and `all` roles.
async fn run_worker_and_reaper(pool: deadpool_redis::Pool, config: &AppConfig) -> i32 {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let priorities = priorities_from_config(config);
    let breaker = Arc::new(CircuitBreaker::new(
        "default",
        CircuitBreakerConfig {
            window: config.breaker.window,
            threshold: config.breaker.threshold,
            min_samples: config.breaker.min_samples,
            cooldown: config.breaker.cooldown(),
        },
    ));

    let mut tasks = Vec::new();

    for index in 0..config.worker.count {
        let worker_id = format!("{}-{}", hostname_prefix(), index);
        let fetcher = PriorityFetcher::new(pool.clone(), priorities.clone(), config.worker.poll_timeout_secs);
        let worker_config = WorkerConfig {
            worker_id,
            job_timeout: config.worker.job_timeout(),
            max_retries: config.worker.max_retries,
            backoff_base: config.worker.backoff_base(),
            backoff_cap: config.worker.backoff_cap(),
            heartbeat_interval: config.worker.heartbeat_interval(),
            heartbeat_ttl: config.worker.heartbeat_ttl(),
            completed_trim: config.worker.completed_trim,
        };
        let runtime = WorkerRuntime::new(worker_config, pool.clone(), fetcher, breaker.clone(), handler::default_handler());
        let rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move { runtime.run(rx).await }));
    }

    let reaper = Reaper::new(
        pool.clone(),
        ReaperConfig { interval: config.reaper.interval(), scan_batch: config.reaper.batch },
    );
    let reaper_rx = shutdown_rx.clone();
    tasks.push(tokio::spawn(async move { reaper.run(reaper_rx).await }));

    let admin = Arc::new(Admin::new(pool.clone(), priorities));

    let metrics_sampler_admin = admin.clone();
    let metrics_sampler_rx = shutdown_rx.clone();
    let metrics_sample_interval = config.reaper.interval();
    tasks.push(tokio::spawn(async move {
        run_metrics_sampler(metrics_sampler_admin, metrics_sample_interval, metrics_sampler_rx).await
    }));

    let health_state = health::HealthState { admin, readiness_timeout: Duration::from_secs(2) };
    let health_addr = format!("0.0.0.0:{}", config.observability.health_port);
    let metrics_addr = format!("0.0.0.0:{}", config.observability.metrics_port);

    let (health_listener, metrics_listener) =
        match tokio::try_join!(tokio::net::TcpListener::bind(&health_addr), tokio::net::TcpListener::bind(&metrics_addr)) {
            Ok(listeners) => listeners,
            Err(e) => {
                error!(error = %e, health_addr = %health_addr, metrics_addr = %metrics_addr, "failed to bind health/metrics listeners");
                let _ = shutdown_tx.send(true);
                for task in tasks {
                    let _ = task.await;
                }
                return EXIT_RUNTIME;
            }
        };
    info!(addr = %health_addr, "health server listening");
    info!(addr = %metrics_addr, "metrics server listening");

    let health_shutdown = shutdown_rx.clone();
    let health_server = tokio::spawn(async move {
        let router = health::health_router(health_state);
        axum::serve(health_listener, router).with_graceful_shutdown(wait_for_shutdown(health_shutdown)).await
    });
    let metrics_shutdown = shutdown_rx.clone();
    let metrics_server = tokio::spawn(async move {
        let router = health::metrics_router();
        axum::serve(metrics_listener, router).with_graceful_shutdown(wait_for_shutdown(metrics_shutdown)).await
    });

    shutdown_signal().await;
    info!("shutdown signal received, draining workers");
    let _ = shutdown_tx.send(true);

    for task in tasks {
        let _ = task.await;
    }
    let _ = health_server.await;
    let _ = metrics_server.await;

    info!("shutdown complete");
    EXIT_SUCCESS
}

/// Resolves once `shutdown` flips true; used as the graceful-shutdown
/// future for the health/metrics servers so they stop accepting new
/// connections in lockstep with the worker/reaper tasks.
async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    if *shutdown.borrow() {
        return;
    }
    let _ = shutdown.changed().await;
}

/// Periodically samples queue depths, DLQ size, and live worker count onto
/// their gauges so `/metrics` reflects current state between job events.
async fn run_metrics_sampler(admin: Arc<Admin>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            break;
        }
        if let Err(e) = admin.record_metrics().await {
            error!(error = %e, "failed to sample queue/dlq/worker metrics");
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => { if *shutdown.borrow() { break; } }
        }
    }
}

async fn run_all(pool: deadpool_redis::Pool, config: &AppConfig) -> i32 {
    let producer_pool = pool.clone();
    let producer_config = config.clone();
    tokio::spawn(async move {
        let status = run_producer(producer_pool, &producer_config).await;
        if status != EXIT_SUCCESS {
            error!(status, "initial producer scan under --role=all did not complete cleanly");
        }
    });

    run_worker_and_reaper(pool, config).await
}

async fn run_admin(pool: deadpool_redis::Pool, config: &AppConfig, args: &AdminArgs) -> i32 {
    let priorities = priorities_from_config(config);
    let admin = Admin::new(pool, priorities);

    let Some(cmd) = args.admin_cmd else {
        error!("--admin-cmd is required when --role=admin");
        return EXIT_CONFIGURATION;
    };

    match cmd {
        AdminCmd::Stats => match admin.stats().await {
            Ok(stats) => {
                println!("{}", serde_json::to_string_pretty(&stats).unwrap_or_default());
                EXIT_SUCCESS
            }
            Err(e) => {
                error!(error = %e, "stats failed");
                EXIT_RUNTIME
            }
        },
        AdminCmd::StatsKeys => {
            let keys = stats_keys_layout(config);
            println!("{}", serde_json::to_string_pretty(&keys).unwrap_or_default());
            EXIT_SUCCESS
        }
        AdminCmd::Peek => {
            let Some(queue) = args.queue.as_deref() else {
                error!("--queue is required for --admin-cmd=peek");
                return EXIT_CONFIGURATION;
            };
            match admin.peek(&Priority::new(queue), args.n).await {
                Ok(jobs) => {
                    println!("{}", serde_json::to_string_pretty(&jobs).unwrap_or_default());
                    EXIT_SUCCESS
                }
                Err(e) => {
                    error!(error = %e, "peek failed");
                    EXIT_RUNTIME
                }
            }
        }
        AdminCmd::PurgeDlq => match admin.purge_dlq(args.yes).await {
            Ok(()) => {
                info!("dead letter queue purged");
                EXIT_SUCCESS
            }
            Err(JobError::Refused(reason)) => {
                error!(reason = %reason, "purge-dlq refused");
                EXIT_REFUSED
            }
            Err(e) => {
                error!(error = %e, "purge-dlq failed");
                EXIT_RUNTIME
            }
        },
        AdminCmd::PurgeAll => match admin.purge_all(args.dev, args.yes).await {
            Ok(()) => {
                info!("all work queue keys purged");
                EXIT_SUCCESS
            }
            Err(JobError::Refused(reason)) => {
                error!(reason = %reason, "purge-all refused");
                EXIT_REFUSED
            }
            Err(e) => {
                error!(error = %e, "purge-all failed");
                EXIT_RUNTIME
            }
        },
    }
}

/// The static Redis key layout for the configured priority ladder, for the
/// `stats-keys` admin subcommand: unlike `stats`, this is documentation
/// (no Redis round trip), useful for confirming what a given config
/// resolves to before pointing it at a live deployment.
fn stats_keys_layout(config: &AppConfig) -> serde_json::Value {
    use workqueue_core::schema;
    let queues: Vec<String> = priorities_from_config(config).iter().map(schema::queue_key).collect();
    serde_json::json!({
        "queues": queues,
        "processing_pattern": schema::PROCESSING_SCAN_PATTERN,
        "dead_letter": schema::DEAD_LETTER_KEY,
        "completed": schema::COMPLETED_KEY,
        "rate_limit_producer": config.producer.rate_limit_key,
    })
}

fn hostname_prefix() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| format!("pid-{}", std::process::id()))
}

/// Resolves once SIGINT or (on unix) SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received sigterm"),
    }
}
