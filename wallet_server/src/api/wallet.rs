//! Wallet endpoints.

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use wallet_ledger::{
    security::Operation,
    wallet::{Transaction, TransferReceipt, UserId, WalletResult},
};

use super::{
    AppState,
    request_id::RequestId,
    response::{ApiError, ApiResponse},
};
use crate::{logging, metrics};

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct BalanceData {
    pub user_id: UserId,
    pub balance: Decimal,
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Map an engine result onto the envelope, recording its outcome
fn respond<T: Serialize>(
    request_id: &RequestId,
    operation: Operation,
    user_id: UserId,
    result: WalletResult<T>,
) -> ApiResult<T> {
    match result {
        Ok(data) => {
            metrics::wallet_operations_total(operation.as_str(), "ok");
            logging::log_wallet_event(request_id.as_str(), operation.as_str(), user_id, "ok");
            Ok(Json(ApiResponse::ok(data)))
        }
        Err(err) => {
            let api_error = ApiError::from(err);
            metrics::wallet_operations_total(operation.as_str(), api_error.message);
            logging::log_wallet_event(
                request_id.as_str(),
                operation.as_str(),
                user_id,
                api_error.message,
            );
            Err(api_error)
        }
    }
}

pub async fn deposit(
    State(state): State<AppState>,
    request_id: RequestId,
    user_id: Result<Path<UserId>, PathRejection>,
    body: Result<Json<AmountRequest>, JsonRejection>,
) -> ApiResult<BalanceData> {
    let Path(user_id) = user_id?;
    let Json(req) = body?;

    let result = state
        .wallet_manager
        .deposit(user_id, req.amount)
        .await
        .map(|balance| BalanceData { user_id, balance });

    respond(&request_id, Operation::Deposit, user_id, result)
}

pub async fn withdraw(
    State(state): State<AppState>,
    request_id: RequestId,
    user_id: Result<Path<UserId>, PathRejection>,
    body: Result<Json<AmountRequest>, JsonRejection>,
) -> ApiResult<BalanceData> {
    let Path(user_id) = user_id?;
    let Json(req) = body?;

    let result = state
        .wallet_manager
        .withdraw(user_id, req.amount)
        .await
        .map(|balance| BalanceData { user_id, balance });

    respond(&request_id, Operation::Withdraw, user_id, result)
}

pub async fn transfer(
    State(state): State<AppState>,
    request_id: RequestId,
    users: Result<Path<(UserId, UserId)>, PathRejection>,
    body: Result<Json<AmountRequest>, JsonRejection>,
) -> ApiResult<TransferReceipt> {
    let Path((sender_id, receiver_id)) = users?;
    let Json(req) = body?;

    let result = state
        .wallet_manager
        .transfer(sender_id, receiver_id, req.amount)
        .await;

    respond(&request_id, Operation::Transfer, sender_id, result)
}

pub async fn get_balance(
    State(state): State<AppState>,
    request_id: RequestId,
    user_id: Result<Path<UserId>, PathRejection>,
) -> ApiResult<BalanceData> {
    let Path(user_id) = user_id?;

    let result = state
        .wallet_manager
        .get_balance(user_id)
        .await
        .map(|balance| BalanceData { user_id, balance });

    respond(&request_id, Operation::GetBalance, user_id, result)
}

pub async fn get_transaction_history(
    State(state): State<AppState>,
    request_id: RequestId,
    user_id: Result<Path<UserId>, PathRejection>,
) -> ApiResult<Vec<Transaction>> {
    let Path(user_id) = user_id?;

    let result = state.wallet_manager.get_transaction_history(user_id).await;

    respond(
        &request_id,
        Operation::GetTransactionHistory,
        user_id,
        result,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_must_be_a_string() {
        let req: AmountRequest = serde_json::from_str(r#"{"amount": "12.50"}"#).unwrap();
        assert_eq!(req.amount, Decimal::new(1250, 2));

        assert!(serde_json::from_str::<AmountRequest>(r#"{"amount": 12.5}"#).is_err());
        assert!(serde_json::from_str::<AmountRequest>(r#"{"amount": "twelve"}"#).is_err());
    }

    #[test]
    fn test_balance_serializes_as_string() {
        let json = serde_json::to_value(BalanceData {
            user_id: 3,
            balance: Decimal::new(705, 1),
        })
        .unwrap();
        assert_eq!(json["user_id"], 3);
        assert_eq!(json["balance"], "70.5");
    }
}
