//! Error types for security module

use std::time::Duration;
use thiserror::Error;

/// Result type for rate limiting operations
pub type RateLimiterResult<T> = Result<T, RateLimitError>;

/// Rate limiting errors
///
/// These only describe an unreachable or misbehaving counter store. Going
/// over the limit is a normal `RateLimitResult::Limited`, not an error.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Redis error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Counter store unreachable
    #[error("Rate counter store unavailable: {0}")]
    Unavailable(String),

    /// Counter store did not answer before the deadline
    #[error("Rate counter store timed out after {0:?}")]
    Timeout(Duration),
}
