//! Wallet module: the ledger engine and its data types.
//!
//! This module implements:
//! - Deposits, withdrawals and transfers as single store transactions
//! - A guarded debit that never drives a balance negative
//! - Cache-first balance reads with read-through on miss
//! - Per-user transaction history
//!
//! ## Example
//!
//! ```no_run
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//! use wallet_ledger::cache::{connect_redis, RedisBalanceCache, RedisConfig};
//! use wallet_ledger::db::{Database, PgLedgerStore};
//! use wallet_ledger::security::{RateLimiter, RedisRateCounter};
//! use wallet_ledger::wallet::{WalletConfig, WalletManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let redis = connect_redis(&RedisConfig::from_env()).await?;
//!
//!     let wallet = WalletManager::new(
//!         Arc::new(PgLedgerStore::new(db.pool().clone())),
//!         Arc::new(RedisBalanceCache::new(redis.clone())),
//!         Arc::new(RateLimiter::new(Arc::new(RedisRateCounter::new(redis)))),
//!         WalletConfig::from_env(),
//!     );
//!
//!     let receipt = wallet.transfer(1, 2, Decimal::new(2500, 2)).await?;
//!     println!("Sender balance after transfer: {}", receipt.sender_balance);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod errors;
pub mod manager;
pub mod models;

pub use config::WalletConfig;
pub use errors::{WalletError, WalletResult};
pub use manager::{HealthStatus, WalletManager};
pub use models::{NewTransaction, Transaction, TransactionType, TransferReceipt, UserId, Wallet};
