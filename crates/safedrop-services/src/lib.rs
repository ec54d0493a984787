//! SafeDrop Services Layer
//!
//! Stateful collaborators of the upload pipeline: the malware scanning client,
//! the sliding-window rate limiter and the download token issuer. Each one is
//! constructed once from configuration and shared through application state.

pub mod rate_limit;
pub mod scan;
pub mod token;

pub use rate_limit::{
    FileRateStore, MemoryRateStore, RateDecision, RateLimiter, RateStore, RateStoreError,
};
pub use scan::{ScanClient, ScanResult};
pub use token::{TokenConfigError, TokenIssuer};
