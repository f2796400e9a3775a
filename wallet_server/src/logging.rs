//! Structured logging configuration.
//!
//! This module provides structured logging with request correlation and
//! wallet event tracking. Records emitted through the `log` facade by the
//! ledger library are forwarded into the same subscriber.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Features:
/// - Request ID correlation
/// - `log` records from the ledger library bridged into tracing
/// - Configurable log levels via RUST_LOG env var
///
/// # Example
///
/// ```no_run
/// use wallet_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    // Console layer for development
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log the outcome of a wallet operation with structured data
///
/// # Arguments
///
/// * `request_id` - Correlation ID of the HTTP request
/// * `operation` - Engine operation name
/// * `user_id` - User the operation was charged to
/// * `outcome` - `ok` or the error kind
///
/// # Example
///
/// ```
/// use wallet_server::logging::log_wallet_event;
///
/// log_wallet_event("6f1c0a52", "withdraw", 42, "insufficient_funds");
/// ```
pub fn log_wallet_event(request_id: &str, operation: &str, user_id: i64, outcome: &str) {
    match outcome {
        "ok" => tracing::debug!(
            request_id = request_id,
            operation = operation,
            user_id = user_id,
            "Wallet operation committed"
        ),
        "internal_server_error" | "timeout" => tracing::error!(
            request_id = request_id,
            operation = operation,
            user_id = user_id,
            outcome = outcome,
            "Wallet operation failed"
        ),
        _ => tracing::info!(
            request_id = request_id,
            operation = operation,
            user_id = user_id,
            outcome = outcome,
            "Wallet operation rejected"
        ),
    }
}

/// Log API request/response
///
/// # Arguments
///
/// * `request_id` - Correlation ID of the request
/// * `method` - HTTP method
/// * `path` - Matched route
/// * `status_code` - Response status code
/// * `duration_ms` - Request duration in milliseconds
///
pub fn log_api_request(
    request_id: &str,
    method: &str,
    path: &str,
    status_code: u16,
    duration_ms: u64,
) {
    if duration_ms > 1000 {
        tracing::warn!(
            request_id = request_id,
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            "Slow API request"
        );
    } else {
        tracing::info!(
            request_id = request_id,
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            "API request completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_wallet_event() {
        // Just ensure it doesn't panic
        log_wallet_event("req-1", "deposit", 1, "ok");
        log_wallet_event("req-2", "withdraw", 1, "insufficient_funds");
        log_wallet_event("req-3", "transfer", 1, "internal_server_error");
    }

    #[test]
    fn test_log_api_request() {
        log_api_request("req-1", "GET", "/wallet/{user_id}/balance", 200, 45);
        log_api_request("req-2", "POST", "/wallet/{user_id}/withdraw", 504, 10_000);
    }
}
