//! Per-user, per-operation admission control.
//!
//! Each `(operation, user_id)` pair gets its own fixed window on a shared
//! counter store, so a burst of withdrawals cannot starve the same user's
//! deposits. When the counter store cannot be reached the limiter denies.

use super::counter::RateCounterStore;
use super::errors::{RateLimitError, RateLimiterResult};
use crate::wallet::UserId;
use log::warn;
use std::{collections::HashMap, sync::Arc, time::Duration};

/// Rate-limited wallet operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Deposit,
    Withdraw,
    Transfer,
    GetBalance,
    GetTransactionHistory,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Deposit,
        Operation::Withdraw,
        Operation::Transfer,
        Operation::GetBalance,
        Operation::GetTransactionHistory,
    ];

    /// Name used in scope keys, logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Deposit => "deposit",
            Operation::Withdraw => "withdraw",
            Operation::Transfer => "transfer",
            Operation::GetBalance => "get_balance",
            Operation::GetTransactionHistory => "get_transaction_history",
        }
    }

    fn env_prefix(&self) -> &'static str {
        match self {
            Operation::Deposit => "DEPOSIT",
            Operation::Withdraw => "WITHDRAW",
            Operation::Transfer => "TRANSFER",
            Operation::GetBalance => "GET_BALANCE",
            Operation::GetTransactionHistory => "GET_TRANSACTION_HISTORY",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate limit configuration for an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Units admitted per window (burst and steady-state rate)
    pub max_units: u32,

    /// Window length
    pub window: Duration,

    /// Units charged per call
    pub cost: u32,
}

impl RateLimitConfig {
    /// `max_units` per `window`, one unit per call
    pub fn per_window(max_units: u32, window: Duration) -> Self {
        Self {
            max_units,
            window,
            cost: 1,
        }
    }

    /// Configuration for one operation from environment variables
    ///
    /// - `RATE_LIMIT_<OP>_UNITS` (default: 100)
    /// - `RATE_LIMIT_<OP>_WINDOW_MS` (default: 1000)
    /// - `RATE_LIMIT_COST` (default: 1)
    pub fn for_operation(operation: Operation) -> Self {
        let prefix = operation.env_prefix();
        Self {
            max_units: std::env::var(format!("RATE_LIMIT_{prefix}_UNITS"))
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            window: Duration::from_millis(
                std::env::var(format!("RATE_LIMIT_{prefix}_WINDOW_MS"))
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1000),
            ),
            cost: std::env::var("RATE_LIMIT_COST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
        }
    }
}

/// Deadline for one counter store call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(500);

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_window(100, Duration::from_secs(1))
    }
}

/// Rate limiter over a shared counter store
#[derive(Clone)]
pub struct RateLimiter {
    /// Counter store
    store: Arc<dyn RateCounterStore>,

    /// Operation configurations
    configs: HashMap<Operation, RateLimitConfig>,

    /// Deadline for each counter store call; expiry counts as a store failure
    store_timeout: Duration,
}

impl RateLimiter {
    /// Create a rate limiter with every operation configured from the environment
    ///
    /// # Arguments
    ///
    /// * `store` - Shared counter store
    pub fn new(store: Arc<dyn RateCounterStore>) -> Self {
        let configs = Operation::ALL
            .into_iter()
            .map(|op| (op, RateLimitConfig::for_operation(op)))
            .collect();

        Self {
            store,
            configs,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Create a rate limiter applying the same limit to every operation
    pub fn uniform(store: Arc<dyn RateCounterStore>, config: RateLimitConfig) -> Self {
        let configs = Operation::ALL
            .into_iter()
            .map(|op| (op, config.clone()))
            .collect();

        Self {
            store,
            configs,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Replace the configuration for one operation
    pub fn with_config(mut self, operation: Operation, config: RateLimitConfig) -> Self {
        self.configs.insert(operation, config);
        self
    }

    /// Replace the counter store deadline
    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Configuration in effect for `operation`
    pub fn config(&self, operation: Operation) -> RateLimitConfig {
        self.configs.get(&operation).cloned().unwrap_or_default()
    }

    /// Bucket key: `operation_name:user_id`
    pub fn scope_key(operation: Operation, user_id: UserId) -> String {
        format!("{}:{}", operation.as_str(), user_id)
    }

    /// Charge `units` against the bucket and report the outcome
    ///
    /// Going over the limit is `Ok(RateLimitResult::Limited { .. })`; only an
    /// unreachable or slow counter store is an error.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use wallet_ledger::security::{Operation, RateLimiter, RateLimitResult};
    /// # async fn example(limiter: &RateLimiter) {
    /// match limiter.check(Operation::Withdraw, 42, 1).await {
    ///     Ok(RateLimitResult::Allowed { remaining }) => {
    ///         println!("Request allowed, {} units remaining", remaining);
    ///     }
    ///     Ok(RateLimitResult::Limited { retry_after }) => {
    ///         println!("Rate limited, retry after {:?}", retry_after);
    ///     }
    ///     Err(e) => println!("Error: {}", e),
    /// }
    /// # }
    /// ```
    pub async fn check(
        &self,
        operation: Operation,
        user_id: UserId,
        units: u32,
    ) -> RateLimiterResult<RateLimitResult> {
        let config = self.config(operation);

        // Can never fit in a window, so don't burn the user's budget on it
        if units > config.max_units {
            return Ok(RateLimitResult::Limited {
                retry_after: config.window,
            });
        }

        let key = Self::scope_key(operation, user_id);
        let window = tokio::time::timeout(
            self.store_timeout,
            self.store.increment(&key, units, config.window),
        )
        .await
        .map_err(|_| RateLimitError::Timeout(self.store_timeout))??;

        if window.count <= u64::from(config.max_units) {
            Ok(RateLimitResult::Allowed {
                remaining: config.max_units - window.count as u32,
            })
        } else {
            Ok(RateLimitResult::Limited {
                retry_after: window.resets_in,
            })
        }
    }

    /// Fail-closed admission for one call at the configured cost
    pub async fn admit(&self, operation: Operation, user_id: UserId) -> RateLimitResult {
        let config = self.config(operation);
        match self.check(operation, user_id, config.cost).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    "Rate counter store failed for {}, denying: {}",
                    Self::scope_key(operation, user_id),
                    e
                );
                RateLimitResult::Limited {
                    retry_after: config.window,
                }
            }
        }
    }

    /// Boolean form of [`RateLimiter::check`]; store failures deny
    pub async fn allow_n(&self, operation: Operation, user_id: UserId, units: u32) -> bool {
        match self.check(operation, user_id, units).await {
            Ok(result) => result.is_allowed(),
            Err(e) => {
                warn!(
                    "Rate counter store failed for {}, denying: {}",
                    Self::scope_key(operation, user_id),
                    e
                );
                false
            }
        }
    }

    /// `allow_n` at the configured per-call cost
    pub async fn allow(&self, operation: Operation, user_id: UserId) -> bool {
        self.admit(operation, user_id).await.is_allowed()
    }
}

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Action is allowed
    Allowed { remaining: u32 },

    /// Action is rejected until the window resets
    Limited { retry_after: Duration },
}

impl RateLimitResult {
    /// Check if action is allowed
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }

    /// Get remaining units (if allowed)
    pub fn remaining(&self) -> Option<u32> {
        match self {
            RateLimitResult::Allowed { remaining } => Some(*remaining),
            _ => None,
        }
    }

    /// Get retry delay (if limited)
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RateLimitResult::Limited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
