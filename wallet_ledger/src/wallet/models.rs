//! Wallet data models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// User ID type
pub type UserId = i64;

/// Wallet model (balance of record)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ledger record kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdraw,
    Transfer,
}

impl TransactionType {
    /// Column value stored in `transactions.transaction_type`
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdraw => "withdraw",
            TransactionType::Transfer => "transfer",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionType::Deposit),
            "withdraw" => Ok(TransactionType::Withdraw),
            "transfer" => Ok(TransactionType::Transfer),
            other => Err(format!("unknown transaction type: {other}")),
        }
    }
}

/// Committed ledger record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub sender_user_id: UserId,
    pub receiver_user_id: UserId,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Ledger record about to be written inside a store transaction
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub sender_user_id: UserId,
    pub receiver_user_id: UserId,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl NewTransaction {
    /// Record for a single-party movement (deposit or withdraw)
    pub fn single(user_id: UserId, transaction_type: TransactionType, amount: Decimal) -> Self {
        Self {
            sender_user_id: user_id,
            receiver_user_id: user_id,
            transaction_type,
            amount,
            created_at: Utc::now(),
        }
    }

    /// Record for a transfer between two users
    pub fn transfer(sender_id: UserId, receiver_id: UserId, amount: Decimal) -> Self {
        Self {
            sender_user_id: sender_id,
            receiver_user_id: receiver_id,
            transaction_type: TransactionType::Transfer,
            amount,
            created_at: Utc::now(),
        }
    }
}

/// Outcome of a committed transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub transaction_id: i64,
    pub sender_balance: Decimal,
    pub receiver_balance: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_round_trips_column_value() {
        for kind in [
            TransactionType::Deposit,
            TransactionType::Withdraw,
            TransactionType::Transfer,
        ] {
            assert_eq!(kind.as_str().parse::<TransactionType>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_transaction_type_rejected() {
        assert!("refund".parse::<TransactionType>().is_err());
        assert!("Deposit".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_transaction_type_serializes_lowercase() {
        let json = serde_json::to_string(&TransactionType::Withdraw).unwrap();
        assert_eq!(json, "\"withdraw\"");
    }

    #[test]
    fn test_single_party_record_uses_same_user() {
        let record = NewTransaction::single(7, TransactionType::Deposit, Decimal::ONE);
        assert_eq!(record.sender_user_id, 7);
        assert_eq!(record.receiver_user_id, 7);
    }
}
