use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::security::{RateCounterStore, RateLimitError, RateLimiterResult, WindowCount};

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    closes_at: Instant,
}

/// Fixed-window counters kept in process memory
///
/// Windows are measured on the tokio clock, so paused-time tests can step
/// through them.
#[derive(Clone, Default)]
pub struct MemoryRateCounter {
    windows: Arc<Mutex<HashMap<String, Window>>>,
    unavailable: Arc<AtomicBool>,
    stalled: Arc<AtomicBool>,
}

impl MemoryRateCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every increment fail as if the backend were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make every increment hang until the caller gives up
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }
}

#[async_trait]
impl RateCounterStore for MemoryRateCounter {
    async fn increment(
        &self,
        key: &str,
        units: u32,
        window: Duration,
    ) -> RateLimiterResult<WindowCount> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RateLimitError::Unavailable("memory counter disabled".into()));
        }

        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        let entry = windows
            .entry(key.to_string())
            .and_modify(|w| {
                if w.closes_at <= now {
                    *w = Window {
                        count: 0,
                        closes_at: now + window,
                    };
                }
            })
            .or_insert(Window {
                count: 0,
                closes_at: now + window,
            });
        entry.count += u64::from(units);

        Ok(WindowCount {
            count: entry.count,
            resets_in: entry.closes_at.saturating_duration_since(now),
        })
    }
}
