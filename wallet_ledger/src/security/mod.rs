//! Security module providing per-user admission control.
//!
//! ## Rate Limiting
//!
//! Every wallet operation is charged against a fixed window keyed by
//! `operation:user_id` on a shared counter store:
//! - **Default**: 100 units per second per operation and user, 1 unit per call
//! - **Isolation**: buckets never share budget across users or operations
//! - **Fail closed**: an unreachable counter store denies the request
//!
//! ## Example
//!
//! ```no_run
//! use wallet_ledger::security::{Operation, RateLimiter, RedisRateCounter};
//! use wallet_ledger::cache::{connect_redis, RedisConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let conn = connect_redis(&RedisConfig::from_env()).await?;
//!     let limiter = RateLimiter::new(Arc::new(RedisRateCounter::new(conn)));
//!
//!     if limiter.allow(Operation::Withdraw, 42).await {
//!         println!("Withdrawal admitted");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod counter;
pub mod errors;
pub mod rate_limiter;

pub use counter::{RateCounterStore, RedisRateCounter, WindowCount};
pub use errors::{RateLimitError, RateLimiterResult};
pub use rate_limiter::{Operation, RateLimitConfig, RateLimitResult, RateLimiter};
