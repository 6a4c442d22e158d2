//! Fixed-window rate limiting, keyed by caller identity.
//!
//! Invariant: within one window, the admitted count for an identity never
//! exceeds the quota. Windows reset at the boundary. Counters are the only
//! cross-call shared state in the bridge; DashMap entries keep increments
//! atomic under concurrent calls.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Hint carried by an admission denial: how long until the window resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAfter(pub Duration);

impl RetryAfter {
    /// Whole seconds for the `Retry-After` header, rounded up and never 0.
    pub fn header_secs(&self) -> u64 {
        self.0.as_secs_f64().ceil().max(1.0) as u64
    }
}

struct Window {
    started: Instant,
    count: u32,
}

/// Per-identity fixed-window counter.
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    quota: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(quota: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            quota,
            window,
        }
    }

    pub fn per_minute(quota: u32) -> Self {
        Self::new(quota, Duration::from_secs(60))
    }

    /// Admit or deny one request for `identity`. Admission consumes one
    /// unit of quota; denial consumes nothing.
    pub fn check(&self, identity: &str) -> Result<(), RetryAfter> {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(identity.to_string())
            .or_insert_with(|| Window {
                started: now,
                count: 0,
            });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count < self.quota {
            entry.count += 1;
            Ok(())
        } else {
            let elapsed = now.duration_since(entry.started);
            Err(RetryAfter(self.window.saturating_sub(elapsed)))
        }
    }
}
