use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::{LedgerStore, LedgerTransaction};
use crate::wallet::{NewTransaction, Transaction, UserId, Wallet, WalletError, WalletResult};

/// Store call that a fault can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Begin,
    Lock,
    Credit,
    Debit,
    Record,
    Commit,
    Read,
}

#[derive(Debug, Default)]
struct Faults {
    fail_next: Option<FailPoint>,
    stall_next: Option<FailPoint>,
}

#[derive(Debug, Default)]
struct LedgerState {
    wallets: HashMap<UserId, Wallet>,
    transactions: Vec<Transaction>,
    next_id: i64,
}

/// Ledger store kept in process memory
///
/// Store transactions are serialized: each one holds the state lock from
/// `begin` until it commits, rolls back or is dropped, and stages its writes
/// so nothing is visible before commit.
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
    faults: Arc<StdMutex<Faults>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call at `point` fail with a store error
    pub fn fail_next(&self, point: FailPoint) {
        self.faults().fail_next = Some(point);
    }

    /// Make the next call at `point` never complete
    pub fn stall_next(&self, point: FailPoint) {
        self.faults().stall_next = Some(point);
    }

    /// Committed balance, bypassing fault injection
    pub async fn balance(&self, user_id: UserId) -> Option<Decimal> {
        let state = self.state.lock().await;
        state.wallets.get(&user_id).map(|w| w.balance)
    }

    /// Sum of every committed balance
    pub async fn total_balance(&self) -> Decimal {
        let state = self.state.lock().await;
        state.wallets.values().map(|w| w.balance).sum()
    }

    /// Number of committed ledger records
    pub async fn transaction_count(&self) -> usize {
        self.state.lock().await.transactions.len()
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn intercept(faults: &StdMutex<Faults>, point: FailPoint) -> WalletResult<()> {
        let (fail, stall) = {
            let mut faults = faults.lock().unwrap_or_else(|e| e.into_inner());
            let fail = faults.fail_next == Some(point);
            if fail {
                faults.fail_next = None;
            }
            let stall = faults.stall_next == Some(point);
            if stall {
                faults.stall_next = None;
            }
            (fail, stall)
        };

        if stall {
            std::future::pending::<()>().await;
        }
        if fail {
            return Err(WalletError::TransactionFailed(format!(
                "injected {point:?} failure"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> WalletResult<Box<dyn LedgerTransaction>> {
        Self::intercept(&self.faults, FailPoint::Begin).await?;
        let guard = self.state.clone().lock_owned().await;

        Ok(Box::new(MemoryLedgerTransaction {
            guard: Some(guard),
            staged_wallets: HashMap::new(),
            staged_records: Vec::new(),
            faults: self.faults.clone(),
        }))
    }

    async fn fetch_balance(&self, user_id: UserId) -> WalletResult<Option<Decimal>> {
        Self::intercept(&self.faults, FailPoint::Read).await?;
        Ok(self.balance(user_id).await)
    }

    async fn fetch_history(&self, user_id: UserId) -> WalletResult<Vec<Transaction>> {
        Self::intercept(&self.faults, FailPoint::Read).await?;
        let state = self.state.lock().await;

        // Records are appended in id order
        Ok(state
            .transactions
            .iter()
            .filter(|t| t.sender_user_id == user_id)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> WalletResult<()> {
        Self::intercept(&self.faults, FailPoint::Read).await
    }
}

/// Open in-memory store transaction
pub struct MemoryLedgerTransaction {
    guard: Option<OwnedMutexGuard<LedgerState>>,
    staged_wallets: HashMap<UserId, Wallet>,
    staged_records: Vec<Transaction>,
    faults: Arc<StdMutex<Faults>>,
}

impl MemoryLedgerTransaction {
    fn state(&self) -> WalletResult<&LedgerState> {
        self.guard
            .as_deref()
            .ok_or_else(|| WalletError::TransactionFailed("transaction already finished".into()))
    }

    fn current(&self, user_id: UserId) -> WalletResult<Option<Wallet>> {
        if let Some(wallet) = self.staged_wallets.get(&user_id) {
            return Ok(Some(wallet.clone()));
        }
        Ok(self.state()?.wallets.get(&user_id).cloned())
    }
}

#[async_trait]
impl LedgerTransaction for MemoryLedgerTransaction {
    async fn lock_wallets(&mut self, _user_ids: &[UserId]) -> WalletResult<()> {
        MemoryLedgerStore::intercept(&self.faults, FailPoint::Lock).await?;
        // Holding the state lock already excludes every other transaction
        self.state().map(|_| ())
    }

    async fn credit(&mut self, user_id: UserId, amount: Decimal) -> WalletResult<Decimal> {
        MemoryLedgerStore::intercept(&self.faults, FailPoint::Credit).await?;
        let now = Utc::now();

        let wallet = match self.current(user_id)? {
            Some(mut wallet) => {
                wallet.balance = wallet.balance.checked_add(amount).ok_or_else(|| {
                    WalletError::TransactionFailed(format!(
                        "balance overflow crediting {amount} to user {user_id}"
                    ))
                })?;
                wallet.updated_at = now;
                wallet
            }
            None => Wallet {
                user_id,
                balance: amount,
                created_at: now,
                updated_at: now,
            },
        };

        let balance = wallet.balance;
        self.staged_wallets.insert(user_id, wallet);
        Ok(balance)
    }

    async fn debit(&mut self, user_id: UserId, amount: Decimal) -> WalletResult<Decimal> {
        MemoryLedgerStore::intercept(&self.faults, FailPoint::Debit).await?;

        let Some(mut wallet) = self.current(user_id)?.filter(|w| w.balance >= amount) else {
            return Err(WalletError::InsufficientFunds {
                user_id,
                required: amount,
            });
        };

        wallet.balance -= amount;
        wallet.updated_at = Utc::now();
        let balance = wallet.balance;
        self.staged_wallets.insert(user_id, wallet);
        Ok(balance)
    }

    async fn record(&mut self, entry: &NewTransaction) -> WalletResult<i64> {
        MemoryLedgerStore::intercept(&self.faults, FailPoint::Record).await?;
        let id = self.state()?.next_id + self.staged_records.len() as i64 + 1;

        self.staged_records.push(Transaction {
            id,
            sender_user_id: entry.sender_user_id,
            receiver_user_id: entry.receiver_user_id,
            transaction_type: entry.transaction_type,
            amount: entry.amount,
            created_at: entry.created_at,
        });
        Ok(id)
    }

    async fn commit(&mut self) -> WalletResult<()> {
        MemoryLedgerStore::intercept(&self.faults, FailPoint::Commit).await?;
        let mut state = self
            .guard
            .take()
            .ok_or_else(|| WalletError::TransactionFailed("transaction already finished".into()))?;

        state.next_id += self.staged_records.len() as i64;
        state.transactions.append(&mut self.staged_records);
        state.wallets.extend(self.staged_wallets.drain());
        Ok(())
    }

    async fn rollback(&mut self) -> WalletResult<()> {
        self.staged_wallets.clear();
        self.staged_records.clear();
        self.guard = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::TransactionType;
    use std::time::Duration;

    #[tokio::test]
    async fn test_uncommitted_changes_are_invisible_and_dropped() {
        let store = MemoryLedgerStore::new();

        {
            let mut tx = store.begin().await.unwrap();
            tx.credit(1, Decimal::from(50)).await.unwrap();
            tx.record(&NewTransaction::single(1, TransactionType::Deposit, Decimal::from(50)))
                .await
                .unwrap();
        }

        assert_eq!(store.balance(1).await, None);
        assert_eq!(store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn test_commit_publishes_balances_and_records() {
        let store = MemoryLedgerStore::new();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.credit(1, Decimal::from(50)).await.unwrap(), Decimal::from(50));
        assert_eq!(tx.debit(1, Decimal::from(20)).await.unwrap(), Decimal::from(30));
        let id = tx
            .record(&NewTransaction::single(1, TransactionType::Deposit, Decimal::from(50)))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(id, 1);
        assert_eq!(store.fetch_balance(1).await.unwrap(), Some(Decimal::from(30)));
        assert_eq!(store.fetch_history(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_guarded_debit_refuses_overdraft_and_missing_wallet() {
        let store = MemoryLedgerStore::new();
        let mut tx = store.begin().await.unwrap();

        let err = tx.debit(9, Decimal::ONE).await.unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { user_id: 9, .. }));

        tx.credit(9, Decimal::ONE).await.unwrap();
        assert!(tx.debit(9, Decimal::new(101, 2)).await.is_err());
        assert_eq!(tx.debit(9, Decimal::ONE).await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let store = MemoryLedgerStore::new();
        store.fail_next(FailPoint::Read);

        assert!(store.fetch_balance(1).await.is_err());
        assert!(store.fetch_balance(1).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_call_never_completes() {
        let store = MemoryLedgerStore::new();
        store.stall_next(FailPoint::Begin);

        let result = tokio::time::timeout(Duration::from_secs(1), store.begin()).await;
        assert!(result.is_err());
        assert!(store.begin().await.is_ok());
    }

    #[tokio::test]
    async fn test_overflowing_credit_fails_without_staging() {
        let store = MemoryLedgerStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.credit(1, Decimal::MAX).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = tx.credit(1, Decimal::ONE).await.unwrap_err();
        assert!(matches!(err, WalletError::TransactionFailed(_)));
        tx.rollback().await.unwrap();

        assert_eq!(store.balance(1).await, Some(Decimal::MAX));
    }
}
