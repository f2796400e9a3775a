//! Wallet manager: the engine that keeps balances, ledger records and the
//! balance cache in step.

use super::{
    config::WalletConfig,
    errors::{WalletError, WalletResult},
    models::{NewTransaction, Transaction, TransactionType, TransferReceipt, UserId},
};
use crate::cache::{BalanceCache, CacheResult};
use crate::db::{LedgerStore, LedgerTransaction, timeouts::with_timeout};
use crate::security::{Operation, RateLimitResult, RateLimiter};
use log::{debug, error, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

/// Reachability of the engine's backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub store: bool,
    pub cache: bool,
}

impl HealthStatus {
    /// The engine can serve requests without the cache, never without the store
    pub fn is_healthy(&self) -> bool {
        self.store
    }
}

/// Wallet manager
#[derive(Clone)]
pub struct WalletManager {
    store: Arc<dyn LedgerStore>,
    cache: Arc<dyn BalanceCache>,
    limiter: Arc<RateLimiter>,
    config: WalletConfig,
}

impl WalletManager {
    /// Create a new wallet manager
    ///
    /// # Arguments
    ///
    /// * `store` - Ledger of record
    /// * `cache` - Shared balance cache
    /// * `limiter` - Admission control
    /// * `config` - Store and cache timeouts
    pub fn new(
        store: Arc<dyn LedgerStore>,
        cache: Arc<dyn BalanceCache>,
        limiter: Arc<RateLimiter>,
        config: WalletConfig,
    ) -> Self {
        Self {
            store,
            cache,
            limiter,
            config,
        }
    }

    /// Credit a user's wallet, creating it on first deposit
    ///
    /// # Arguments
    ///
    /// * `user_id` - User ID
    /// * `amount` - Amount to add, must be positive
    ///
    /// # Returns
    ///
    /// * `WalletResult<Decimal>` - Balance after the deposit
    ///
    /// # Errors
    ///
    /// * `WalletError::InvalidAmount` - Amount is zero or negative
    /// * `WalletError::RateLimited` - Too many deposits in the current window
    /// * `WalletError::Timeout` - Store did not finish in time; nothing was written
    pub async fn deposit(&self, user_id: UserId, amount: Decimal) -> WalletResult<Decimal> {
        self.deposit_with_type(user_id, amount, TransactionType::Deposit)
            .await
    }

    /// Deposit recorded under an explicit ledger record type
    pub async fn deposit_with_type(
        &self,
        user_id: UserId,
        amount: Decimal,
        transaction_type: TransactionType,
    ) -> WalletResult<Decimal> {
        validate_amount(amount)?;
        self.admit(Operation::Deposit, user_id).await?;

        let balance = with_timeout(self.config.transaction_timeout, async {
            let mut tx = self.store.begin().await?;
            let outcome: WalletResult<Decimal> = async {
                let balance = tx.credit(user_id, amount).await?;
                tx.record(&NewTransaction::single(user_id, transaction_type, amount))
                    .await?;
                Ok(balance)
            }
            .await;
            finish(tx, outcome).await
        })
        .await?;

        debug!("Deposited {amount} for user {user_id}, balance {balance}");

        self.best_effort("increment", user_id, self.cache.increment(user_id, amount))
            .await;

        Ok(balance)
    }

    /// Debit a user's wallet
    ///
    /// # Arguments
    ///
    /// * `user_id` - User ID
    /// * `amount` - Amount to remove, must be positive
    ///
    /// # Returns
    ///
    /// * `WalletResult<Decimal>` - Balance after the withdrawal
    ///
    /// # Errors
    ///
    /// * `WalletError::InvalidAmount` - Amount is zero or negative
    /// * `WalletError::InsufficientFunds` - No wallet, or balance below `amount`
    /// * `WalletError::RateLimited` - Too many withdrawals in the current window
    pub async fn withdraw(&self, user_id: UserId, amount: Decimal) -> WalletResult<Decimal> {
        self.withdraw_with_type(user_id, amount, TransactionType::Withdraw)
            .await
    }

    /// Withdrawal recorded under an explicit ledger record type
    pub async fn withdraw_with_type(
        &self,
        user_id: UserId,
        amount: Decimal,
        transaction_type: TransactionType,
    ) -> WalletResult<Decimal> {
        validate_amount(amount)?;
        self.admit(Operation::Withdraw, user_id).await?;
        let from_cache = self.ensure_funds(user_id, amount).await?;

        let outcome = with_timeout(self.config.transaction_timeout, async {
            let mut tx = self.store.begin().await?;
            let outcome: WalletResult<Decimal> = async {
                let balance = tx.debit(user_id, amount).await?;
                tx.record(&NewTransaction::single(user_id, transaction_type, amount))
                    .await?;
                Ok(balance)
            }
            .await;
            finish(tx, outcome).await
        })
        .await;
        self.discard_if_refused(user_id, from_cache, &outcome).await;
        let balance = outcome?;

        debug!("Withdrew {amount} for user {user_id}, balance {balance}");

        self.best_effort("set", user_id, self.cache.set(user_id, balance))
            .await;

        Ok(balance)
    }

    /// Move funds between two users in one store transaction
    ///
    /// The receiver's wallet is created if it does not exist yet. Admission
    /// is charged to the sender.
    ///
    /// # Arguments
    ///
    /// * `sender_id` - User being debited
    /// * `receiver_id` - User being credited
    /// * `amount` - Amount to move, must be positive
    ///
    /// # Returns
    ///
    /// * `WalletResult<TransferReceipt>` - Record id and both post-transfer balances
    ///
    /// # Errors
    ///
    /// * `WalletError::InvalidAmount` - Amount is zero or negative
    /// * `WalletError::InvalidTransfer` - Sender and receiver are the same user
    /// * `WalletError::InsufficientFunds` - Sender cannot cover `amount`
    pub async fn transfer(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        amount: Decimal,
    ) -> WalletResult<TransferReceipt> {
        validate_amount(amount)?;
        if sender_id == receiver_id {
            return Err(WalletError::InvalidTransfer(sender_id));
        }
        self.admit(Operation::Transfer, sender_id).await?;
        let from_cache = self.ensure_funds(sender_id, amount).await?;

        let outcome = with_timeout(self.config.transaction_timeout, async {
            let mut tx = self.store.begin().await?;
            let outcome: WalletResult<TransferReceipt> = async {
                // Row locks in ascending user order so opposite transfers can't deadlock
                tx.lock_wallets(&[sender_id, receiver_id]).await?;
                let sender_balance = tx.debit(sender_id, amount).await?;
                let receiver_balance = tx.credit(receiver_id, amount).await?;
                let transaction_id = tx
                    .record(&NewTransaction::transfer(sender_id, receiver_id, amount))
                    .await?;

                Ok(TransferReceipt {
                    transaction_id,
                    sender_balance,
                    receiver_balance,
                })
            }
            .await;
            finish(tx, outcome).await
        })
        .await;
        self.discard_if_refused(sender_id, from_cache, &outcome).await;
        let receipt = outcome?;

        debug!(
            "Transferred {amount} from user {sender_id} to user {receiver_id} (transaction {})",
            receipt.transaction_id
        );

        self.best_effort(
            "set",
            sender_id,
            self.cache.set(sender_id, receipt.sender_balance),
        )
        .await;
        self.best_effort(
            "increment",
            receiver_id,
            self.cache.increment(receiver_id, amount),
        )
        .await;

        Ok(receipt)
    }

    /// Get wallet balance for a user, cache first
    ///
    /// # Errors
    ///
    /// * `WalletError::WalletNotFound` - User has never been credited
    /// * `WalletError::RateLimited` - Too many reads in the current window
    pub async fn get_balance(&self, user_id: UserId) -> WalletResult<Decimal> {
        self.admit(Operation::GetBalance, user_id).await?;

        if let Some(Some(balance)) = self
            .best_effort("get", user_id, self.cache.get(user_id))
            .await
        {
            return Ok(balance);
        }

        let balance = with_timeout(
            self.config.transaction_timeout,
            self.store.fetch_balance(user_id),
        )
        .await?
        .ok_or(WalletError::WalletNotFound(user_id))?;

        self.best_effort("set", user_id, self.cache.set(user_id, balance))
            .await;

        Ok(balance)
    }

    /// Every record the user sent, oldest first
    ///
    /// # Errors
    ///
    /// * `WalletError::NoTransactionHistory` - The user has no records
    /// * `WalletError::Database` - The store could not be read
    pub async fn get_transaction_history(&self, user_id: UserId) -> WalletResult<Vec<Transaction>> {
        self.admit(Operation::GetTransactionHistory, user_id)
            .await?;

        let history = with_timeout(
            self.config.transaction_timeout,
            self.store.fetch_history(user_id),
        )
        .await?;

        if history.is_empty() {
            return Err(WalletError::NoTransactionHistory(user_id));
        }

        Ok(history)
    }

    /// Ping the store and the cache
    pub async fn health_check(&self) -> HealthStatus {
        let store = match with_timeout(self.config.transaction_timeout, self.store.health_check())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("Ledger store health check failed: {e}");
                false
            }
        };

        let cache = self
            .best_effort("health_check", 0, self.cache.health_check())
            .await
            .is_some();

        HealthStatus { store, cache }
    }

    async fn admit(&self, operation: Operation, user_id: UserId) -> WalletResult<()> {
        match self.limiter.admit(operation, user_id).await {
            RateLimitResult::Allowed { .. } => Ok(()),
            RateLimitResult::Limited { retry_after } => Err(WalletError::RateLimited {
                operation: operation.as_str(),
                user_id,
                retry_after: Some(retry_after),
            }),
        }
    }

    /// Reject a debit the user visibly cannot cover before opening a transaction
    ///
    /// A cached zero is not trusted; it may be a placeholder written before
    /// the user's first deposit reached the cache. Returns whether the check
    /// was answered from the cache.
    async fn ensure_funds(&self, user_id: UserId, amount: Decimal) -> WalletResult<bool> {
        let cached = self
            .best_effort("get", user_id, self.cache.get(user_id))
            .await
            .flatten()
            .filter(|balance| !balance.is_zero());

        let from_cache = cached.is_some();
        let available = match cached {
            Some(balance) => balance,
            None => with_timeout(
                self.config.transaction_timeout,
                self.store.fetch_balance(user_id),
            )
            .await?
            .ok_or(WalletError::InsufficientFunds {
                user_id,
                required: amount,
            })?,
        };

        if available < amount {
            return Err(WalletError::InsufficientFunds {
                user_id,
                required: amount,
            });
        }

        Ok(from_cache)
    }

    /// Drop a cached balance that the guarded debit just proved too high
    async fn discard_if_refused<T>(
        &self,
        user_id: UserId,
        from_cache: bool,
        outcome: &WalletResult<T>,
    ) {
        if from_cache && matches!(outcome, Err(WalletError::InsufficientFunds { .. })) {
            warn!("Cached balance for user {user_id} exceeded the ledger, invalidating");
            self.best_effort("invalidate", user_id, self.cache.invalidate(user_id))
                .await;
        }
    }

    /// Run a cache call under the cache timeout, logging and swallowing failures
    async fn best_effort<T, F>(&self, action: &str, user_id: UserId, call: F) -> Option<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        match tokio::time::timeout(self.config.cache_timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!("Balance cache {action} failed for user {user_id}: {e}");
                None
            }
            Err(_) => {
                warn!(
                    "Balance cache {action} timed out for user {user_id} after {:?}",
                    self.config.cache_timeout
                );
                None
            }
        }
    }
}

fn validate_amount(amount: Decimal) -> WalletResult<()> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::InvalidAmount(amount));
    }
    Ok(())
}

/// Commit on success; roll back and surface the original error otherwise
async fn finish<T>(
    mut tx: Box<dyn LedgerTransaction>,
    outcome: WalletResult<T>,
) -> WalletResult<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!("Rollback failed after {e}: {rollback_err}");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryBalanceCache, MemoryLedgerStore, MemoryRateCounter};
    use crate::security::RateLimitConfig;
    use std::time::Duration;

    fn create_test_manager() -> (WalletManager, MemoryLedgerStore, MemoryBalanceCache) {
        let store = MemoryLedgerStore::new();
        let cache = MemoryBalanceCache::new();
        let limiter = RateLimiter::uniform(
            Arc::new(MemoryRateCounter::new()),
            RateLimitConfig::per_window(1_000, Duration::from_secs(60)),
        );
        let manager = WalletManager::new(
            Arc::new(store.clone()),
            Arc::new(cache.clone()),
            Arc::new(limiter),
            WalletConfig::default(),
        );
        (manager, store, cache)
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(Decimal::new(1, 2)).is_ok());
        assert!(matches!(
            validate_amount(Decimal::ZERO),
            Err(WalletError::InvalidAmount(_))
        ));
        assert!(matches!(
            validate_amount(Decimal::new(-5, 0)),
            Err(WalletError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_deposit_with_type_records_given_type() {
        let (manager, store, _) = create_test_manager();

        manager
            .deposit_with_type(1, Decimal::from(10), TransactionType::Transfer)
            .await
            .unwrap();

        let history = store.fetch_history(1).await.unwrap();
        assert_eq!(history[0].transaction_type, TransactionType::Transfer);
    }

    #[tokio::test]
    async fn test_cached_zero_falls_back_to_store() {
        let (manager, _, cache) = create_test_manager();
        manager.deposit(1, Decimal::from(10)).await.unwrap();

        cache.set(1, Decimal::ZERO).await.unwrap();

        assert_eq!(
            manager.withdraw(1, Decimal::from(4)).await.unwrap(),
            Decimal::from(6)
        );
        assert_eq!(cache.snapshot().get(&1), Some(&Decimal::from(6)));
    }

    #[tokio::test]
    async fn test_health_check_reports_cache_separately() {
        let (manager, _, cache) = create_test_manager();

        let status = manager.health_check().await;
        assert!(status.store && status.cache);

        cache.set_unavailable(true);
        let status = manager.health_check().await;
        assert!(status.is_healthy());
        assert!(!status.cache);
    }
}
