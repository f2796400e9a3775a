//! Wallet error types.

use super::models::UserId;
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

/// Wallet errors
#[derive(Debug, Error)]
pub enum WalletError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Insufficient balance, or the balance could not be verified
    #[error("Insufficient funds for user {user_id}: required {required}")]
    InsufficientFunds { user_id: UserId, required: Decimal },

    /// Wallet not found
    #[error("Wallet not found for user {0}")]
    WalletNotFound(UserId),

    /// User has no recorded activity
    #[error("No transaction history for user {0}")]
    NoTransactionHistory(UserId),

    /// Invalid amount (must be positive)
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Sender and receiver are the same wallet
    #[error("Invalid transfer: sender and receiver are both user {0}")]
    InvalidTransfer(UserId),

    /// Admission control rejected the attempt
    #[error("Rate limit exceeded for {operation}:{user_id}")]
    RateLimited {
        operation: &'static str,
        user_id: UserId,
        retry_after: Option<Duration>,
    },

    /// Store phase did not finish in time; the open transaction was rolled back
    #[error("Ledger operation timed out after {0:?}")]
    Timeout(Duration),

    /// Transaction failed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}

impl WalletError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Database errors are sanitized to prevent information disclosure about
    /// the internal system structure, and user IDs are redacted.
    pub fn client_message(&self) -> String {
        match self {
            WalletError::Database(_) | WalletError::TransactionFailed(_) => {
                "Internal server error".to_string()
            }
            WalletError::WalletNotFound(_) => "Wallet not found".to_string(),
            WalletError::NoTransactionHistory(_) => "No transaction history".to_string(),
            WalletError::InsufficientFunds { .. } => "Insufficient funds".to_string(),
            WalletError::RateLimited { .. } => "Too many requests".to_string(),
            _ => self.to_string(),
        }
    }

    /// Whether this is one of the not-found outcomes
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            WalletError::WalletNotFound(_) | WalletError::NoTransactionHistory(_)
        )
    }

    /// Whether the failure came from the ledger store itself
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            WalletError::Database(_) | WalletError::TransactionFailed(_)
        )
    }
}

/// Result type for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;
