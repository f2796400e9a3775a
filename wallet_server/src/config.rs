//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use std::net::SocketAddr;
use std::time::Duration;
use wallet_ledger::{
    cache::RedisConfig,
    db::DatabaseConfig,
    security::{Operation, RateLimitConfig},
    wallet::WalletConfig,
};

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Prometheus exporter address; no exporter when unset
    pub metrics_bind: Option<SocketAddr>,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Redis configuration (balance cache and rate counters)
    pub redis: RedisConfig,
    /// Engine timeouts
    pub wallet: WalletConfig,
    /// Per-operation admission limits
    pub rate_limits: Vec<(Operation, RateLimitConfig)>,
    /// Apply embedded migrations on startup
    pub run_migrations: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `redis_url_override` - Optional Redis URL override (from CLI args)
    ///
    /// # Returns
    ///
    /// * `Result<ServerConfig, ConfigError>` - Loaded configuration or error
    ///
    /// # Errors
    ///
    /// Returns error if an address variable is set but cannot be parsed
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
        redis_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        // Bind address
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_addr_env("SERVER_BIND")?.unwrap_or_else(default_bind),
        };

        let metrics_bind = parse_addr_env("METRICS_BIND")?;

        // Database configuration
        let mut database = DatabaseConfig::from_env();
        if let Some(database_url) = database_url_override {
            database.database_url = database_url;
        }

        // Redis configuration
        let mut redis = RedisConfig::from_env();
        if let Some(redis_url) = redis_url_override {
            redis.redis_url = redis_url;
        }

        let rate_limits = Operation::ALL
            .into_iter()
            .map(|op| (op, RateLimitConfig::for_operation(op)))
            .collect();

        Ok(ServerConfig {
            bind,
            metrics_bind,
            database,
            redis,
            wallet: WalletConfig::from_env(),
            rate_limits,
            run_migrations: parse_env_or("RUN_MIGRATIONS", true),
        })
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate pool sizes
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid {
                var: "DB_MAX_CONNECTIONS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed max connections ({})",
                    self.database.max_connections
                ),
            });
        }

        if self.database.connection_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "DB_CONNECTION_TIMEOUT_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.redis.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "REDIS_CONNECT_TIMEOUT_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        // Validate engine timeouts
        if self.wallet.transaction_timeout == Duration::ZERO {
            return Err(ConfigError::Invalid {
                var: "WALLET_TRANSACTION_TIMEOUT_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.wallet.cache_timeout == Duration::ZERO {
            return Err(ConfigError::Invalid {
                var: "WALLET_CACHE_TIMEOUT_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        // Validate rate limits
        for (operation, limit) in &self.rate_limits {
            let prefix = operation.as_str().to_uppercase();

            if limit.max_units == 0 {
                return Err(ConfigError::Invalid {
                    var: format!("RATE_LIMIT_{prefix}_UNITS"),
                    reason: "Must be greater than 0".to_string(),
                });
            }

            if limit.window == Duration::ZERO {
                return Err(ConfigError::Invalid {
                    var: format!("RATE_LIMIT_{prefix}_WINDOW_MS"),
                    reason: "Must be greater than 0".to_string(),
                });
            }

            if limit.cost == 0 || limit.cost > limit.max_units {
                return Err(ConfigError::Invalid {
                    var: "RATE_LIMIT_COST".to_string(),
                    reason: format!(
                        "Must be between 1 and the {} limit ({})",
                        operation, limit.max_units
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Parse an optional socket address; set but unparseable is an error
fn parse_addr_env(key: &str) -> Result<Option<SocketAddr>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => {
            value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::Invalid {
                    var: key.to_string(),
                    reason: format!("'{value}' is not a valid IP:PORT address"),
                })
        }
        _ => Ok(None),
    }
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
