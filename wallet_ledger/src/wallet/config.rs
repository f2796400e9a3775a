//! Engine timing configuration.

use std::time::Duration;

/// Timeouts applied by the wallet manager
#[derive(Debug, Clone)]
pub struct WalletConfig {
    /// Upper bound for the whole store phase of one operation
    pub transaction_timeout: Duration,

    /// Upper bound for a single cache call
    pub cache_timeout: Duration,
}

impl WalletConfig {
    /// Create configuration from environment variables
    ///
    /// - `WALLET_TRANSACTION_TIMEOUT_MS` (default: 10000)
    /// - `WALLET_CACHE_TIMEOUT_MS` (default: 500)
    pub fn from_env() -> Self {
        let transaction_timeout_ms = std::env::var("WALLET_TRANSACTION_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10_000);

        let cache_timeout_ms = std::env::var("WALLET_CACHE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);

        Self {
            transaction_timeout: Duration::from_millis(transaction_timeout_ms),
            cache_timeout: Duration::from_millis(cache_timeout_ms),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            transaction_timeout: crate::db::timeouts::DEFAULT_TRANSACTION_TIMEOUT,
            cache_timeout: Duration::from_millis(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        unsafe {
            std::env::remove_var("WALLET_TRANSACTION_TIMEOUT_MS");
            std::env::remove_var("WALLET_CACHE_TIMEOUT_MS");
        }
        let config = WalletConfig::from_env();
        assert_eq!(config.transaction_timeout, Duration::from_secs(10));
        assert_eq!(config.cache_timeout, Duration::from_millis(500));
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        unsafe {
            std::env::set_var("WALLET_TRANSACTION_TIMEOUT_MS", "2500");
            std::env::set_var("WALLET_CACHE_TIMEOUT_MS", "not-a-number");
        }
        let config = WalletConfig::from_env();
        assert_eq!(config.transaction_timeout, Duration::from_millis(2500));
        assert_eq!(config.cache_timeout, Duration::from_millis(500));
        unsafe {
            std::env::remove_var("WALLET_TRANSACTION_TIMEOUT_MS");
            std::env::remove_var("WALLET_CACHE_TIMEOUT_MS");
        }
    }
}
