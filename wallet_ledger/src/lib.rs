//! # Wallet Ledger
//!
//! Per-user monetary balances backed by a durable transaction ledger.
//!
//! Every balance change is written together with exactly one ledger record in
//! a single store transaction, so a failure part way through never creates or
//! destroys money. Balance reads are served from a shared cache that is only
//! ever a projection of the ledger, and every operation passes a per-user,
//! per-operation rate limiter before it reaches the store.
//!
//! ## Architecture
//!
//! Control flow for a mutation:
//!
//! - **Validation**: amounts must be strictly positive
//! - **Admission**: the rate limiter charges the `operation:user_id` bucket
//! - **Store phase**: balance change and ledger record in one transaction
//! - **Cache update**: best effort, after commit only
//!
//! ## Core Modules
//!
//! - [`wallet`]: The engine (`WalletManager`), models and errors
//! - [`db`]: Ledger store traits, PostgreSQL backend, pool and timeouts
//! - [`cache`]: Balance cache trait and Redis backend
//! - [`security`]: Rate limiter and shared counter stores
//! - [`memory`]: In-process backends for all three collaborators
//!
//! ## Example
//!
//! ```
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//! use wallet_ledger::memory::{MemoryBalanceCache, MemoryLedgerStore, MemoryRateCounter};
//! use wallet_ledger::security::RateLimiter;
//! use wallet_ledger::wallet::{WalletConfig, WalletManager};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = WalletManager::new(
//!     Arc::new(MemoryLedgerStore::new()),
//!     Arc::new(MemoryBalanceCache::new()),
//!     Arc::new(RateLimiter::new(Arc::new(MemoryRateCounter::new()))),
//!     WalletConfig::default(),
//! );
//!
//! manager.deposit(1, Decimal::from(100)).await?;
//! assert_eq!(manager.withdraw(1, Decimal::from(30)).await?, Decimal::from(70));
//! # Ok(())
//! # }
//! ```

/// Balance cache
pub mod cache;

/// Ledger store, connection pool and timeouts
pub mod db;

/// In-process backends
pub mod memory;

/// Admission control
pub mod security;

/// Wallet engine, models and errors
pub mod wallet;

pub use cache::{BalanceCache, RedisBalanceCache};
pub use db::{Database, LedgerStore, LedgerTransaction, PgLedgerStore};
pub use security::{Operation, RateLimiter};
pub use wallet::{WalletError, WalletManager, WalletResult};
