//! Balance cache: a shared, non-authoritative projection of wallet balances.
//!
//! Entries are keyed `wallet:balance:{user_id}` and hold the balance as a
//! decimal string. The ledger store stays the source of truth; a cache entry
//! may be absent, stale or evicted at any time without losing money, and the
//! wallet manager re-derives it from the store on the next read.
//!
//! ## Example
//!
//! ```no_run
//! use wallet_ledger::cache::{connect_redis, BalanceCache, RedisBalanceCache, RedisConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let conn = connect_redis(&RedisConfig::from_env()).await?;
//!     let cache = RedisBalanceCache::new(conn);
//!
//!     if let Some(balance) = cache.get(1).await? {
//!         println!("cached balance: {balance}");
//!     }
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use rust_decimal::Decimal;
use std::time::Duration;

use crate::wallet::UserId;

pub mod errors;
pub mod redis_cache;

pub use errors::{CacheError, CacheResult};
pub use redis_cache::RedisBalanceCache;

/// Cache key for a user's balance
pub fn balance_key(user_id: UserId) -> String {
    format!("wallet:balance:{user_id}")
}

/// Shared `user_id → balance` cache
#[async_trait]
pub trait BalanceCache: Send + Sync {
    /// Cached balance; `Ok(None)` is a miss, distinct from a backend error
    async fn get(&self, user_id: UserId) -> CacheResult<Option<Decimal>>;

    /// Overwrite the cached balance
    async fn set(&self, user_id: UserId, balance: Decimal) -> CacheResult<()>;

    /// Atomically add `delta` to a present entry and return the new value
    ///
    /// An absent entry is left absent (`Ok(None)`), so the next reader
    /// repopulates it from the store instead of trusting a partial sum.
    async fn increment(&self, user_id: UserId, delta: Decimal) -> CacheResult<Option<Decimal>>;

    /// Drop the cached balance
    async fn invalidate(&self, user_id: UserId) -> CacheResult<()>;

    /// Cheap connectivity check
    async fn health_check(&self) -> CacheResult<()>;
}

/// Redis connection configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL
    pub redis_url: String,

    /// Time allowed to establish the connection in seconds
    pub connect_timeout_secs: u64,
}

impl RedisConfig {
    /// Create configuration from environment variables
    ///
    /// - `REDIS_URL` (default: `redis://127.0.0.1:6379/0`)
    /// - `REDIS_CONNECT_TIMEOUT_SECS` (default: 5)
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string()),
            connect_timeout_secs: std::env::var("REDIS_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            connect_timeout_secs: 5,
        }
    }
}

/// Open a reconnecting Redis connection shared by the cache and the rate counter
pub async fn connect_redis(config: &RedisConfig) -> Result<ConnectionManager, redis::RedisError> {
    let client = redis::Client::open(config.redis_url.as_str())?;
    let connect = ConnectionManager::new(client);

    match tokio::time::timeout(Duration::from_secs(config.connect_timeout_secs), connect).await {
        Ok(result) => result,
        Err(_) => Err(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "Timed out connecting to redis",
        ))),
    }
}
