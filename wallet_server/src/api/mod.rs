//! HTTP API for the wallet server.
//!
//! Thin axum layer over [`WalletManager`]: handlers parse the path and body,
//! call one engine operation, and map the result onto the response envelope.
//! No handler retries, and no handler touches the store or cache directly.
//!
//! # Modules
//!
//! - [`wallet`]: Deposit, withdraw, transfer, balance and history handlers
//! - [`response`]: Response envelope and error-to-status mapping
//! - [`request_id`]: Request correlation, access logging and HTTP metrics
//!
//! # Endpoints Overview
//!
//! ```text
//! POST /wallet/{user_id}/deposit                      - Credit a wallet
//! POST /wallet/{user_id}/withdraw                     - Debit a wallet
//! POST /wallet/transfer/{sender_id}/to/{receiver_id}  - Move funds between wallets
//! GET  /wallet/{user_id}/balance                      - Current balance
//! GET  /wallet/{user_id}/transactions                 - Records sent by the user
//! GET  /health                                        - Store and cache health
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wallet_ledger::memory::{MemoryBalanceCache, MemoryLedgerStore, MemoryRateCounter};
//! use wallet_ledger::security::RateLimiter;
//! use wallet_ledger::wallet::{WalletConfig, WalletManager};
//! use wallet_server::api::{AppState, create_router};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let wallet_manager = WalletManager::new(
//!     Arc::new(MemoryLedgerStore::new()),
//!     Arc::new(MemoryBalanceCache::new()),
//!     Arc::new(RateLimiter::new(Arc::new(MemoryRateCounter::new()))),
//!     WalletConfig::default(),
//! );
//!
//! let app = create_router(AppState {
//!     wallet_manager: Arc::new(wallet_manager),
//! });
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively. In production, configure appropriate
//! origins, methods, and headers.

pub mod request_id;
pub mod response;
pub mod wallet;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use wallet_ledger::wallet::WalletManager;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; the engine sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub wallet_manager: Arc<WalletManager>,
}

/// Create the complete API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    let wallet_routes = Router::new()
        .route("/{user_id}/deposit", post(wallet::deposit))
        .route("/{user_id}/withdraw", post(wallet::withdraw))
        .route(
            "/transfer/{sender_id}/to/{receiver_id}",
            post(wallet::transfer),
        )
        .route("/{user_id}/balance", get(wallet::get_balance))
        .route(
            "/{user_id}/transactions",
            get(wallet::get_transaction_history),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest("/wallet", wallet_routes)
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(axum::middleware::from_fn(request_id::request_id_middleware)),
        )
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` while the ledger store answers, `503 Service Unavailable`
/// otherwise. A cache outage is reported but does not fail the check, since
/// every operation still works against the store.
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","version":"0.1.0","store":true,"cache":true,"timestamp":"2026-10-18T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.wallet_manager.health_check().await;

    let status_code = if health.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if health.is_healthy() { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "store": health.store,
        "cache": health.cache,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
