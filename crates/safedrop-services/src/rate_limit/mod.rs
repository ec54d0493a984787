//! Sliding-window rate limiting with pluggable persistence.

mod limiter;
mod store;

pub use limiter::{RateDecision, RateLimiter};
pub use store::{FileRateStore, MemoryRateStore, RateStore, RateStoreError};
