//! Response envelope and error mapping.
//!
//! Every wallet endpoint answers with
//! `{"error_msg", "error_code", "data"?, "detail"?}`. Success is
//! `error_code = 0` with `error_msg = "OK"`; each failure kind has a fixed
//! status, code and message.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::time::Duration;
use wallet_ledger::wallet::WalletError;

use crate::metrics;

pub const CODE_OK: u32 = 0;
pub const CODE_NOT_FOUND: u32 = 100_001;
pub const CODE_TIMEOUT: u32 = 100_002;
pub const CODE_INTERNAL: u32 = 100_003;
pub const CODE_INVALID_PARAMS: u32 = 100_004;
pub const CODE_TOO_MANY_REQUESTS: u32 = 100_006;
pub const CODE_INSUFFICIENT_FUNDS: u32 = 100_007;
pub const CODE_INVALID_AMOUNT: u32 = 100_008;

/// Response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub error_msg: String,
    pub error_code: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            error_msg: "OK".to_string(),
            error_code: CODE_OK,
            data: Some(data),
            detail: None,
        }
    }
}

/// Failed request, rendered as an envelope without `data`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: u32,
    pub message: &'static str,
    pub detail: Option<String>,
    pub retry_after: Option<Duration>,
}

impl ApiError {
    fn new(status: StatusCode, code: u32, message: &'static str) -> Self {
        Self {
            status,
            code,
            message,
            detail: None,
            retry_after: None,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Malformed path or body
    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            CODE_INVALID_PARAMS,
            "invalid params",
        )
        .with_detail(detail)
    }
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        let detail = err.client_message();

        match err {
            WalletError::InvalidAmount(_) | WalletError::InvalidTransfer(_) => Self::new(
                StatusCode::BAD_REQUEST,
                CODE_INVALID_AMOUNT,
                "invalid_amount",
            )
            .with_detail(detail),
            WalletError::InsufficientFunds { .. } => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                CODE_INSUFFICIENT_FUNDS,
                "insufficient_funds",
            ),
            WalletError::WalletNotFound(_) | WalletError::NoTransactionHistory(_) => {
                Self::new(StatusCode::NOT_FOUND, CODE_NOT_FOUND, "not_found").with_detail(detail)
            }
            WalletError::RateLimited {
                operation,
                retry_after,
                ..
            } => {
                metrics::rate_limit_rejections_total(operation);
                Self {
                    retry_after,
                    ..Self::new(
                        StatusCode::TOO_MANY_REQUESTS,
                        CODE_TOO_MANY_REQUESTS,
                        "request_too_quickly",
                    )
                }
            }
            WalletError::Timeout(_) => {
                Self::new(StatusCode::GATEWAY_TIMEOUT, CODE_TIMEOUT, "timeout")
            }
            WalletError::Database(_) | WalletError::TransactionFailed(_) => {
                tracing::error!(error = %err, "Ledger store failure");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    CODE_INTERNAL,
                    "internal_server_error",
                )
            }
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::invalid_params(rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid_params(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            error_msg: self.message.to_string(),
            error_code: self.code,
            data: None,
            detail: self.detail,
        };

        let mut response = (self.status, Json(body)).into_response();

        if let Some(retry_after) = self.retry_after {
            // Whole seconds, rounded up, never zero
            let secs = retry_after.as_millis().div_ceil(1000).max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_wallet_errors_map_to_status_and_code() {
        let cases = [
            (
                WalletError::InvalidAmount(Decimal::ZERO),
                StatusCode::BAD_REQUEST,
                CODE_INVALID_AMOUNT,
            ),
            (
                WalletError::InvalidTransfer(1),
                StatusCode::BAD_REQUEST,
                CODE_INVALID_AMOUNT,
            ),
            (
                WalletError::InsufficientFunds {
                    user_id: 1,
                    required: Decimal::ONE,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
                CODE_INSUFFICIENT_FUNDS,
            ),
            (
                WalletError::WalletNotFound(1),
                StatusCode::NOT_FOUND,
                CODE_NOT_FOUND,
            ),
            (
                WalletError::NoTransactionHistory(1),
                StatusCode::NOT_FOUND,
                CODE_NOT_FOUND,
            ),
            (
                WalletError::Timeout(Duration::from_secs(1)),
                StatusCode::GATEWAY_TIMEOUT,
                CODE_TIMEOUT,
            ),
            (
                WalletError::TransactionFailed("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
                CODE_INTERNAL,
            ),
        ];

        for (err, status, code) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status, status);
            assert_eq!(api.code, code);
        }
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let api: ApiError = WalletError::TransactionFailed("password=hunter2".to_string()).into();
        assert!(api.detail.is_none());
    }

    #[test]
    fn test_retry_after_header_rounds_up() {
        let api: ApiError = WalletError::RateLimited {
            operation: "withdraw",
            user_id: 1,
            retry_after: Some(Duration::from_millis(1200)),
        }
        .into();

        let response = api.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "2");
    }

    #[test]
    fn test_ok_envelope_shape() {
        let json = serde_json::to_value(ApiResponse::ok(5)).unwrap();
        assert_eq!(json["error_msg"], "OK");
        assert_eq!(json["error_code"], 0);
        assert_eq!(json["data"], 5);
        assert!(json.get("detail").is_none());
    }
}
