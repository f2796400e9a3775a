//! HTTP surface for the wallet ledger.
//!
//! Exposes the engine over axum, plus the configuration, logging and
//! metrics plumbing the `wallet_server` binary wires together.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
