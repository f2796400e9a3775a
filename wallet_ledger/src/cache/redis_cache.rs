//! Redis implementation of the balance cache.
//!
//! Balances are stored as decimal strings. Increments are computed in Rust
//! with exact decimal arithmetic and applied with a compare-and-set script,
//! so no floating point ever touches a balance.

use async_trait::async_trait;
use log::warn;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::{BalanceCache, CacheError, CacheResult, balance_key};
use crate::wallet::UserId;

/// Swap the value only if it still equals what the caller read
const COMPARE_AND_SET: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2])
    return 1
end
return 0
";

/// Attempts before a contended increment gives up and invalidates the entry
const MAX_CAS_ATTEMPTS: usize = 8;

/// Balance cache backed by a shared Redis instance
#[derive(Clone)]
pub struct RedisBalanceCache {
    redis: ConnectionManager,
    compare_and_set: redis::Script,
}

impl RedisBalanceCache {
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            redis,
            compare_and_set: redis::Script::new(COMPARE_AND_SET),
        }
    }

    fn parse(key: &str, raw: String) -> CacheResult<Decimal> {
        Decimal::from_str(&raw).map_err(|_| CacheError::Corrupt {
            key: key.to_string(),
            value: raw,
        })
    }
}

#[async_trait]
impl BalanceCache for RedisBalanceCache {
    async fn get(&self, user_id: UserId) -> CacheResult<Option<Decimal>> {
        let key = balance_key(user_id);
        let raw: Option<String> = self.redis.clone().get(&key).await?;
        raw.map(|raw| Self::parse(&key, raw)).transpose()
    }

    async fn set(&self, user_id: UserId, balance: Decimal) -> CacheResult<()> {
        let key = balance_key(user_id);
        let _: () = self.redis.clone().set(&key, balance.to_string()).await?;
        Ok(())
    }

    async fn increment(&self, user_id: UserId, delta: Decimal) -> CacheResult<Option<Decimal>> {
        let key = balance_key(user_id);
        let mut conn = self.redis.clone();

        for _ in 0..MAX_CAS_ATTEMPTS {
            let current: Option<String> = conn.get(&key).await?;
            let Some(current) = current else {
                return Ok(None);
            };

            let parsed = match Self::parse(&key, current.clone()) {
                Ok(value) => value,
                Err(e) => {
                    let _: () = conn.del(&key).await?;
                    return Err(e);
                }
            };

            let Some(updated) = parsed.checked_add(delta) else {
                let _: () = conn.del(&key).await?;
                return Err(CacheError::Corrupt {
                    key,
                    value: current,
                });
            };

            let swapped: i32 = self
                .compare_and_set
                .key(&key)
                .arg(&current)
                .arg(updated.to_string())
                .invoke_async(&mut conn)
                .await?;

            if swapped == 1 {
                return Ok(Some(updated));
            }
        }

        warn!("Balance cache increment for {key} lost {MAX_CAS_ATTEMPTS} races, invalidating");
        let _: () = conn.del(&key).await?;
        Ok(None)
    }

    async fn invalidate(&self, user_id: UserId) -> CacheResult<()> {
        let _: () = self.redis.clone().del(balance_key(user_id)).await?;
        Ok(())
    }

    async fn health_check(&self) -> CacheResult<()> {
        let _: String = redis::cmd("PING").query_async(&mut self.redis.clone()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{RedisConfig, connect_redis};

    async fn create_test_cache() -> RedisBalanceCache {
        let config = RedisConfig {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379/15".to_string()),
            connect_timeout_secs: 2,
        };
        let conn = connect_redis(&config)
            .await
            .expect("Failed to connect to test redis");
        RedisBalanceCache::new(conn)
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = RedisBalanceCache::parse("wallet:balance:1", "12.3.4".to_string()).unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }

    #[test]
    fn test_parse_keeps_precision() {
        let value =
            RedisBalanceCache::parse("wallet:balance:1", "0.30000000000000000001".to_string())
                .unwrap();
        assert_eq!(value.to_string(), "0.30000000000000000001");
    }

    #[tokio::test]
    #[ignore = "Requires redis"]
    async fn test_increment_is_exact_and_skips_absent_entries() {
        let cache = create_test_cache().await;
        let user_id = 990_001;
        cache.invalidate(user_id).await.unwrap();

        assert_eq!(
            cache.increment(user_id, Decimal::new(1, 1)).await.unwrap(),
            None
        );
        assert_eq!(cache.get(user_id).await.unwrap(), None);

        cache.set(user_id, Decimal::new(1, 1)).await.unwrap();
        let updated = cache.increment(user_id, Decimal::new(2, 1)).await.unwrap();
        assert_eq!(updated, Some(Decimal::new(3, 1)));
        assert_eq!(cache.get(user_id).await.unwrap(), Some(Decimal::new(3, 1)));

        cache.invalidate(user_id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "Requires redis"]
    async fn test_concurrent_increments_do_not_lose_updates() {
        let cache = create_test_cache().await;
        let user_id = 990_002;
        cache.set(user_id, Decimal::ZERO).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.increment(user_id, Decimal::ONE).await
            }));
        }
        let mut applied = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                applied += 1;
            }
        }

        // An increment that gave up invalidated the entry instead of dropping it
        match cache.get(user_id).await.unwrap() {
            Some(value) => assert_eq!(value, Decimal::from(applied)),
            None => assert!(applied < 4),
        }

        cache.invalidate(user_id).await.unwrap();
    }
}
