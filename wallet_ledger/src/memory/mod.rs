//! In-process backends for the ledger store, balance cache and rate counter.
//!
//! They implement the same traits as the PostgreSQL and Redis backends, so
//! the wallet manager can run in a single process without external services.
//! Each one can be told to fail or hang, which is how the engine's atomicity,
//! cache isolation and fail-closed behaviour are exercised in tests.

mod cache;
mod counter;
mod ledger;

pub use cache::MemoryBalanceCache;
pub use counter::MemoryRateCounter;
pub use ledger::{FailPoint, MemoryLedgerStore, MemoryLedgerTransaction};
