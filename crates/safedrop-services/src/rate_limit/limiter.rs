use super::store::RateStore;
use safedrop_core::Clock;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Result of one admission check, with the values the HTTP layer reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub retry_after_secs: u64,
}

/// Sliding-window request limiter.
///
/// Each identifier keeps the timestamps of its admitted requests inside the
/// window. Identifiers are hashed before they reach the store. Store failures
/// are logged and the request is admitted.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateStore>,
    clock: Arc<dyn Clock>,
    max_requests: u32,
    window_secs: u64,
    gc_percent: u8,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests", &self.max_requests)
            .field("window_secs", &self.window_secs)
            .field("gc_percent", &self.gc_percent)
            .finish()
    }
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn RateStore>,
        clock: Arc<dyn Clock>,
        max_requests: u32,
        window_secs: u64,
    ) -> Self {
        Self {
            store,
            clock,
            max_requests,
            window_secs,
            gc_percent: 1,
        }
    }

    /// Percentage (0-100) of admission checks that also purge stale records.
    pub fn with_gc_percent(mut self, gc_percent: u8) -> Self {
        self.gc_percent = gc_percent.min(100);
        self
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    fn key(id: &str) -> String {
        hex::encode(Sha256::digest(id.as_bytes()))
    }

    fn live_entries(&self, key: &str, now: u64) -> Vec<u64> {
        let mut timestamps = match self.store.load(key) {
            Ok(ts) => ts,
            Err(e) => {
                tracing::warn!(error = %e, "Rate limit store read failed, allowing request");
                Vec::new()
            }
        };
        // Records from the future are corrupt, not live.
        timestamps.retain(|&ts| ts <= now && now - ts < self.window_secs);
        timestamps.sort_unstable();
        timestamps
    }

    fn retry_after(&self, timestamps: &[u64], now: u64) -> u64 {
        timestamps
            .first()
            .map(|&oldest| oldest.saturating_add(self.window_secs).saturating_sub(now))
            .unwrap_or(0)
    }

    fn maybe_collect_garbage(&self, now: u64) {
        if self.gc_percent == 0 || rand::random_range(0..100u8) >= self.gc_percent {
            return;
        }
        match self.store.purge_older_than(now.saturating_sub(self.window_secs)) {
            Ok(removed) if removed > 0 => {
                tracing::debug!(removed, "Purged stale rate limit records")
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Rate limit garbage collection failed"),
        }
    }

    /// Admit or refuse one request for `id`, recording it when admitted.
    #[tracing::instrument(skip(self, id))]
    pub fn check(&self, id: &str) -> RateDecision {
        let now = self.clock.now_secs();
        self.maybe_collect_garbage(now);

        let key = Self::key(id);
        let mut timestamps = self.live_entries(&key, now);

        if timestamps.len() >= self.max_requests as usize {
            tracing::debug!(count = timestamps.len(), "Rate limit reached");
            return RateDecision {
                allowed: false,
                limit: self.max_requests,
                remaining: 0,
                retry_after_secs: self.retry_after(&timestamps, now),
            };
        }

        timestamps.push(now);
        if let Err(e) = self.store.save(&key, &timestamps) {
            tracing::warn!(error = %e, "Rate limit store write failed");
        }

        RateDecision {
            allowed: true,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(timestamps.len() as u32),
            retry_after_secs: 0,
        }
    }

    pub fn is_allowed(&self, id: &str) -> bool {
        self.check(id).allowed
    }

    /// Requests still available in the current window. Does not record anything.
    pub fn remaining(&self, id: &str) -> u32 {
        let now = self.clock.now_secs();
        let count = self.live_entries(&Self::key(id), now).len();
        self.max_requests.saturating_sub(count as u32)
    }

    /// Seconds until the oldest recorded request leaves the window, 0 when none are recorded.
    pub fn retry_after_secs(&self, id: &str) -> u64 {
        let now = self.clock.now_secs();
        let timestamps = self.live_entries(&Self::key(id), now);
        self.retry_after(&timestamps, now)
    }

    pub fn reset(&self, id: &str) {
        if let Err(e) = self.store.delete(&Self::key(id)) {
            tracing::warn!(error = %e, "Failed to reset rate limit record");
        }
    }
}
