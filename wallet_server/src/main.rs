//! Wallet ledger HTTP server.
//!
//! Wires the PostgreSQL ledger store, the Redis balance cache and rate
//! counters into a `WalletManager` and serves it over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use pico_args::Arguments;
use tracing::{error, info, warn};
use wallet_ledger::{
    cache::{RedisBalanceCache, connect_redis},
    db::{Database, PgLedgerStore},
    security::{RateLimitConfig, RateLimiter, RedisRateCounter},
    wallet::WalletManager,
};
use wallet_server::{api, config::ServerConfig, logging, metrics};

const HELP: &str = "\
Run the wallet ledger HTTP server

USAGE:
  wallet_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]
  --redis-url  URL         Redis connection string     [default: env REDIS_URL or redis://127.0.0.1:6379/0]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND                      Server bind address (e.g., 0.0.0.0:8080)
  METRICS_BIND                     Prometheus exporter address (disabled when unset)
  DATABASE_URL                     PostgreSQL connection string
  REDIS_URL                        Redis connection string
  RUN_MIGRATIONS                   Apply schema migrations on startup [default: true]
  WALLET_TRANSACTION_TIMEOUT_MS    Store phase deadline
  WALLET_CACHE_TIMEOUT_MS          Cache call deadline
  RATE_LIMIT_<OP>_UNITS            Units admitted per window for an operation
  RATE_LIMIT_<OP>_WINDOW_MS        Window length for an operation
  RUST_LOG                         Log filter [default: info,sqlx=warn,hyper=warn]
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    redis_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs
            .opt_value_from_str("--bind")
            .context("Invalid --bind address")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        redis_url: pargs.opt_value_from_str("--redis-url")?,
    };

    let config = ServerConfig::from_env(args.bind, args.database_url, args.redis_url)?;
    config.validate()?;

    logging::init();
    info!("Starting wallet server at {}", config.bind);

    if let Some(metrics_bind) = config.metrics_bind {
        metrics::init_metrics(metrics_bind).map_err(|e| anyhow::anyhow!(e))?;
        info!("Prometheus exporter listening on {}", metrics_bind);
    }

    // Initialize database
    let db = Database::new(&config.database)
        .await
        .context("Failed to connect to database")?;

    if config.run_migrations {
        db.migrate().await.context("Failed to run migrations")?;
        info!("Database migrations applied");
    }

    info!("Database connected successfully");

    // One reconnecting connection serves both cache and counters
    let redis = connect_redis(&config.redis)
        .await
        .context("Failed to connect to redis")?;

    info!("Redis connected successfully");

    // Counters share the cache's Redis, so they share its deadline too
    let mut limiter = RateLimiter::uniform(
        Arc::new(RedisRateCounter::new(redis.clone())),
        RateLimitConfig::default(),
    )
    .with_store_timeout(config.wallet.cache_timeout);
    for (operation, limit) in &config.rate_limits {
        info!(
            "Rate limit for {}: {} unit(s) per {:?}, cost {}",
            operation, limit.max_units, limit.window, limit.cost
        );
        limiter = limiter.with_config(*operation, limit.clone());
    }

    let wallet_manager = Arc::new(WalletManager::new(
        Arc::new(PgLedgerStore::new(db.pool().clone())),
        Arc::new(RedisBalanceCache::new(redis)),
        Arc::new(limiter),
        config.wallet.clone(),
    ));

    let health = wallet_manager.health_check().await;
    if !health.cache {
        warn!("Balance cache is unreachable, serving reads from the ledger store");
    }

    // Create router
    let app = api::create_router(api::AppState { wallet_manager });

    // Start HTTP server
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down server...");
    db.close().await;

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C signal handler: {}", e);
        // Without a handler, run until the process is killed
        std::future::pending::<()>().await;
    }
}
