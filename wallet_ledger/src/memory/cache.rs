use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::{BalanceCache, CacheError, CacheResult, balance_key};
use crate::wallet::UserId;

/// Balance cache kept in process memory
#[derive(Clone, Default)]
pub struct MemoryBalanceCache {
    entries: Arc<Mutex<HashMap<UserId, Decimal>>>,
    unavailable: Arc<AtomicBool>,
    latency_ms: Arc<AtomicU64>,
}

impl MemoryBalanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the backend were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Copy of every entry, bypassing availability
    pub fn snapshot(&self) -> HashMap<UserId, Decimal> {
        self.entries().clone()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<UserId, Decimal>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn reachable(&self) -> CacheResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("memory cache disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl BalanceCache for MemoryBalanceCache {
    async fn get(&self, user_id: UserId) -> CacheResult<Option<Decimal>> {
        self.reachable().await?;
        Ok(self.entries().get(&user_id).copied())
    }

    async fn set(&self, user_id: UserId, balance: Decimal) -> CacheResult<()> {
        self.reachable().await?;
        self.entries().insert(user_id, balance);
        Ok(())
    }

    async fn increment(&self, user_id: UserId, delta: Decimal) -> CacheResult<Option<Decimal>> {
        self.reachable().await?;
        let mut entries = self.entries();
        let Some(balance) = entries.get(&user_id).copied() else {
            return Ok(None);
        };

        match balance.checked_add(delta) {
            Some(updated) => {
                entries.insert(user_id, updated);
                Ok(Some(updated))
            }
            None => {
                // Unrepresentable; drop it so the next read goes to the store
                entries.remove(&user_id);
                Err(CacheError::Corrupt {
                    key: balance_key(user_id),
                    value: balance.to_string(),
                })
            }
        }
    }

    async fn invalidate(&self, user_id: UserId) -> CacheResult<()> {
        self.reachable().await?;
        self.entries().remove(&user_id);
        Ok(())
    }

    async fn health_check(&self) -> CacheResult<()> {
        self.reachable().await
    }
}
