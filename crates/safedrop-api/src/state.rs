//! Application state
//!
//! Every service is built once from configuration in `setup::services` and
//! shared with handlers through `Arc<AppState>`.

use crate::audit::AuditLog;
use crate::documents::DocumentSource;
use safedrop_core::Config;
use safedrop_processing::ContentValidator;
use safedrop_services::{RateLimiter, ScanClient, TokenIssuer};
use safedrop_storage::{DeliveryGuard, LocalStorage};
use std::path::PathBuf;
use std::sync::Arc;

/// Malware scanning policy
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// `None` when scanning is disabled.
    pub client: Option<ScanClient>,
    /// Reject uploads whose scan could not complete.
    pub strict: bool,
}

/// Upload pipeline: validation, staging and commit
#[derive(Debug, Clone)]
pub struct UploadState {
    pub validator: ContentValidator,
    /// Private directory for in-flight uploads; never served.
    pub staging_dir: PathBuf,
    pub storage: LocalStorage,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub upload: UploadState,
    pub scan: ScanConfig,
    pub rate_limiter: RateLimiter,
    pub tokens: TokenIssuer,
    pub delivery: DeliveryGuard,
    pub documents: Arc<dyn DocumentSource>,
    pub audit: AuditLog,
}
