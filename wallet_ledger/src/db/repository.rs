//! Ledger store trait definitions and the PostgreSQL implementation.
//!
//! The wallet manager only talks to the ledger of record through these
//! traits, which keeps it testable against in-memory stores and free of any
//! process-wide database handle.

#![allow(clippy::needless_raw_string_hashes)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row};

use crate::wallet::{NewTransaction, Transaction, TransactionType, UserId, WalletError, WalletResult};

/// Durable, transactional store holding `wallets` and `transactions`
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Begin a store transaction owned by a single logical operation
    async fn begin(&self) -> WalletResult<Box<dyn LedgerTransaction>>;

    /// Read a committed balance; `None` when the user has no wallet row
    async fn fetch_balance(&self, user_id: UserId) -> WalletResult<Option<Decimal>>;

    /// All records sent by `user_id`, in insertion order
    async fn fetch_history(&self, user_id: UserId) -> WalletResult<Vec<Transaction>>;

    /// Cheap connectivity check
    async fn health_check(&self) -> WalletResult<()>;
}

/// An open store transaction
///
/// Dropping a transaction without calling [`LedgerTransaction::commit`]
/// discards every change made through it.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Lock the given wallet rows (those that exist) in ascending user order
    async fn lock_wallets(&mut self, user_ids: &[UserId]) -> WalletResult<()>;

    /// Increase a balance, creating the wallet if absent; returns the new balance
    async fn credit(&mut self, user_id: UserId, amount: Decimal) -> WalletResult<Decimal>;

    /// Decrease a balance only if it covers `amount`; returns the new balance
    ///
    /// Fails with `WalletError::InsufficientFunds` when the wallet is missing
    /// or its balance is below `amount`.
    async fn debit(&mut self, user_id: UserId, amount: Decimal) -> WalletResult<Decimal>;

    /// Append a ledger record; returns its id
    async fn record(&mut self, entry: &NewTransaction) -> WalletResult<i64>;

    /// Make every change visible atomically
    async fn commit(&mut self) -> WalletResult<()>;

    /// Discard every change
    async fn rollback(&mut self) -> WalletResult<()>;
}

/// Default PostgreSQL implementation of `LedgerStore`
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> WalletResult<Box<dyn LedgerTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTransaction { tx: Some(tx) }))
    }

    async fn fetch_balance(&self, user_id: UserId) -> WalletResult<Option<Decimal>> {
        let row = sqlx::query("SELECT balance FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get("balance")))
    }

    async fn fetch_history(&self, user_id: UserId) -> WalletResult<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, sender_user_id, receiver_user_id, transaction_type, amount, created_at
            FROM transactions
            WHERE sender_user_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let kind: String = row.get("transaction_type");
                let transaction_type = kind
                    .parse::<TransactionType>()
                    .map_err(WalletError::TransactionFailed)?;

                Ok(Transaction {
                    id: row.get("id"),
                    sender_user_id: row.get("sender_user_id"),
                    receiver_user_id: row.get("receiver_user_id"),
                    transaction_type,
                    amount: row.get("amount"),
                    created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
                })
            })
            .collect()
    }

    async fn health_check(&self) -> WalletResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// PostgreSQL store transaction; sqlx rolls it back when dropped unfinished
pub struct PgLedgerTransaction {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
}

impl PgLedgerTransaction {
    fn open(&mut self) -> WalletResult<&mut sqlx::Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| WalletError::TransactionFailed("transaction already finished".into()))
    }
}

#[async_trait]
impl LedgerTransaction for PgLedgerTransaction {
    async fn lock_wallets(&mut self, user_ids: &[UserId]) -> WalletResult<()> {
        let mut ids = user_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let tx = self.open()?;
        sqlx::query(
            "SELECT user_id FROM wallets WHERE user_id = ANY($1) ORDER BY user_id FOR UPDATE",
        )
        .bind(ids)
        .fetch_all(&mut **tx)
        .await?;

        Ok(())
    }

    async fn credit(&mut self, user_id: UserId, amount: Decimal) -> WalletResult<Decimal> {
        let tx = self.open()?;
        let row = sqlx::query(
            "INSERT INTO wallets (user_id, balance, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (user_id)
             DO UPDATE SET
                balance = wallets.balance + EXCLUDED.balance,
                updated_at = NOW()
             RETURNING balance",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row.get("balance"))
    }

    async fn debit(&mut self, user_id: UserId, amount: Decimal) -> WalletResult<Decimal> {
        let tx = self.open()?;

        // Check and mutation happen in one statement, serialized on the row lock
        let row = sqlx::query(
            "UPDATE wallets
             SET balance = balance - $1, updated_at = NOW()
             WHERE user_id = $2 AND balance >= $1
             RETURNING balance",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

        match row {
            Some(row) => Ok(row.get("balance")),
            None => Err(WalletError::InsufficientFunds {
                user_id,
                required: amount,
            }),
        }
    }

    async fn record(&mut self, entry: &NewTransaction) -> WalletResult<i64> {
        let tx = self.open()?;
        let row = sqlx::query(
            r#"
            INSERT INTO transactions (sender_user_id, receiver_user_id, transaction_type, amount, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(entry.sender_user_id)
        .bind(entry.receiver_user_id)
        .bind(entry.transaction_type.as_str())
        .bind(entry.amount)
        .bind(entry.created_at.naive_utc())
        .fetch_one(&mut **tx)
        .await?;

        Ok(row.get("id"))
    }

    async fn commit(&mut self) -> WalletResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| WalletError::TransactionFailed("transaction already finished".into()))?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> WalletResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}
