//! Ledger timeout helpers
//!
//! Bounds store work so a slow dependency degrades one request, not the
//! whole process. When the deadline passes the wrapped future is dropped,
//! and with it any open store transaction, which rolls it back.

use crate::wallet::{WalletError, WalletResult};
use std::time::Duration;
use tokio::time::timeout;

/// Default timeout for transactions (10 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Execute a ledger operation with timeout
///
/// # Arguments
///
/// * `duration` - Timeout duration
/// * `future` - Async operation to execute
///
/// # Returns
///
/// * `WalletResult<T>` - Result of the operation or `WalletError::Timeout`
///
/// # Example
///
/// ```no_run
/// use wallet_ledger::db::timeouts::{with_timeout, DEFAULT_TRANSACTION_TIMEOUT};
/// # use sqlx::PgPool;
/// # async fn example(pool: &PgPool) -> wallet_ledger::wallet::WalletResult<()> {
///
/// let row = with_timeout(DEFAULT_TRANSACTION_TIMEOUT, async {
///     Ok(sqlx::query("SELECT 1").fetch_one(pool).await?)
/// })
/// .await?;
/// # let _ = row;
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> WalletResult<T>
where
    F: std::future::Future<Output = WalletResult<T>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(WalletError::Timeout(duration)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_constants() {
        assert_eq!(DEFAULT_TRANSACTION_TIMEOUT.as_secs(), 10);
    }

    #[tokio::test]
    async fn test_timeout_error_display() {
        let err = WalletError::Timeout(Duration::from_secs(5));
        assert!(err.to_string().contains("timed out"));
        assert!(err.to_string().contains("5s"));
    }

    #[tokio::test]
    async fn test_completed_future_passes_through() {
        let result =
            with_timeout(DEFAULT_TRANSACTION_TIMEOUT, async { Ok::<_, WalletError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_inner_error_is_not_masked() {
        let result: WalletResult<()> =
            with_timeout(DEFAULT_TRANSACTION_TIMEOUT, async {
                Err(WalletError::WalletNotFound(3))
            })
            .await;
        assert!(matches!(result, Err(WalletError::WalletNotFound(3))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_future_times_out() {
        let result: WalletResult<()> = with_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(WalletError::Timeout(_))));
    }
}
