//! Shared rate counters.
//!
//! A counter store exposes one atomic operation: add units to the counter
//! for a key, opening a new window of the given length when none is open.
//! The Redis store makes limits cluster-wide; every engine instance pointed
//! at the same Redis shares the same windows.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;

use super::errors::RateLimiterResult;

/// Counter state right after an increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Units consumed in the current window, including this increment
    pub count: u64,

    /// Time until the current window closes
    pub resets_in: Duration,
}

/// Atomic increment-with-window counter store
#[async_trait]
pub trait RateCounterStore: Send + Sync {
    async fn increment(&self, key: &str, units: u32, window: Duration)
    -> RateLimiterResult<WindowCount>;
}

/// INCRBY, then start the window expiry if this call opened it
const INCREMENT_WINDOW: &str = r"
local count = redis.call('INCRBY', KEYS[1], ARGV[1])
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[2])
    ttl = tonumber(ARGV[2])
end
return {count, ttl}
";

/// Counter store backed by a shared Redis instance
#[derive(Clone)]
pub struct RedisRateCounter {
    redis: ConnectionManager,
    increment_window: redis::Script,
}

impl RedisRateCounter {
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            redis,
            increment_window: redis::Script::new(INCREMENT_WINDOW),
        }
    }
}

#[async_trait]
impl RateCounterStore for RedisRateCounter {
    async fn increment(
        &self,
        key: &str,
        units: u32,
        window: Duration,
    ) -> RateLimiterResult<WindowCount> {
        let window_ms = window.as_millis().max(1) as u64;
        let (count, ttl_ms): (i64, i64) = self
            .increment_window
            .key(format!("rate:{key}"))
            .arg(units)
            .arg(window_ms)
            .invoke_async(&mut self.redis.clone())
            .await?;

        Ok(WindowCount {
            count: count.max(0) as u64,
            resets_in: Duration::from_millis(ttl_ms.max(0) as u64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{RedisConfig, connect_redis};

    #[tokio::test]
    #[ignore = "Requires redis"]
    async fn test_redis_counter_opens_window_and_accumulates() {
        let config = RedisConfig {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379/15".to_string()),
            connect_timeout_secs: 2,
        };
        let conn = connect_redis(&config).await.unwrap();
        let counter = RedisRateCounter::new(conn);
        let key = format!("test:{}", chrono::Utc::now().timestamp_nanos_opt().unwrap());

        let first = counter
            .increment(&key, 1, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(first.count, 1);
        assert!(first.resets_in <= Duration::from_secs(5));

        let second = counter
            .increment(&key, 3, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(second.count, 4);
    }
}
