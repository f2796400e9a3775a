//! Prometheus metrics for monitoring wallet server health and performance.
//!
//! Metrics are recorded through the `metrics` facade. When `METRICS_BIND` is
//! set an exporter serves them in Prometheus text format; otherwise the
//! recording calls are no-ops.
//!
//! # Metrics Categories
//!
//! - **HTTP Metrics**: Request counts, duration, status codes
//! - **Wallet Metrics**: Engine operations by outcome
//! - **Rate Limiting Metrics**: Admission rejections by operation
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use wallet_server::metrics;
//! use std::net::SocketAddr;
//!
//! // Initialize metrics exporter
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! // Record HTTP request
//! metrics::http_requests_total("POST", "/wallet/{user_id}/deposit", 200);
//!
//! // Record engine outcome
//! metrics::wallet_operations_total("deposit", "ok");
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Sets up a Prometheus scrape endpoint on the specified address.
/// Metrics will be available at `http://<addr>/metrics`.
///
/// # Arguments
///
/// - `addr`: Address to bind the metrics server to (e.g., `0.0.0.0:9090`)
///
/// # Returns
///
/// Result indicating success or error message
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
///
/// Increments the total HTTP request counter with method, path, and status labels.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Wallet Metrics
// ============================================================================

/// Increment the engine operation counter.
pub fn wallet_operations_total(operation: &str, outcome: &str) {
    metrics::counter!("wallet_operations_total",
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

// ============================================================================
// Rate Limiting Metrics
// ============================================================================

/// Increment rate limit rejections counter.
pub fn rate_limit_rejections_total(operation: &str) {
    metrics::counter!("rate_limit_rejections_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}
