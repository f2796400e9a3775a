//! Balance cache error types.

use std::time::Duration;
use thiserror::Error;

/// Balance cache errors
///
/// The wallet manager never surfaces these to callers; they are logged and
/// the cache is treated as unknown for the affected user.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Redis error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Cached value is not a decimal
    #[error("Corrupt cached balance under {key}: {value}")]
    Corrupt { key: String, value: String },

    /// Backend unreachable
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// Call exceeded its deadline
    #[error("Cache call timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
