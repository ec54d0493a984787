//! Service initialization and application state setup

use crate::audit::{AuditLog, FileAuditSink};
use crate::documents::DirectoryDocumentSource;
use crate::state::{AppState, ScanConfig, UploadState};
use anyhow::{Context, Result};
use safedrop_core::{Clock, Config, SystemClock};
use safedrop_processing::ContentValidator;
use safedrop_services::{FileRateStore, RateLimiter, ScanClient, TokenIssuer};
use safedrop_storage::{DeliveryGuard, LocalStorage};
use std::sync::Arc;

/// Initialize all services against the system clock.
pub async fn initialize_services(config: &Config) -> Result<Arc<AppState>> {
    build_state(config, Arc::new(SystemClock)).await
}

/// Build the application state with an explicit clock.
pub async fn build_state(config: &Config, clock: Arc<dyn Clock>) -> Result<Arc<AppState>> {
    let storage = LocalStorage::new(config.storage_root())
        .await
        .context("Failed to initialize storage root")?;

    tokio::fs::create_dir_all(config.staging_dir())
        .await
        .with_context(|| {
            format!(
                "Failed to create staging directory {}",
                config.staging_dir().display()
            )
        })?;

    let delivery = DeliveryGuard::new(
        storage.base_path(),
        config.download_allowed_types().to_vec(),
    )
    .context("Failed to initialize delivery guard")?;

    let validator = ContentValidator::new(
        config.max_upload_size_bytes() as u64,
        config.upload_allowed_types().to_vec(),
    );

    let scan_client = if config.clamav_enabled() {
        tracing::info!(
            host = %config.clamav_host(),
            port = config.clamav_port(),
            strict = config.clamav_strict(),
            "ClamAV scanning enabled (strict: {})",
            if config.clamav_strict() { "fail-closed" } else { "fail-open" }
        );
        Some(ScanClient::with_timeout(
            config.clamav_host().to_string(),
            config.clamav_port(),
            config.clamav_timeout_secs(),
        ))
    } else {
        tracing::info!("ClamAV scanning disabled");
        None
    };

    let rate_store = FileRateStore::new(config.rate_limit_dir()).with_context(|| {
        format!(
            "Failed to create rate limit directory {}",
            config.rate_limit_dir().display()
        )
    })?;
    let rate_limiter = RateLimiter::new(
        Arc::new(rate_store),
        clock.clone(),
        config.rate_limit_max_requests(),
        config.rate_limit_window_secs(),
    )
    .with_gc_percent(config.rate_limit_gc_percent());

    let tokens = TokenIssuer::new(
        config.token_secret().as_bytes(),
        config.token_lifetime_secs(),
        clock,
    )
    .context("Invalid token signing configuration")?;

    let mut audit = AuditLog::tracing_only();
    if let Some(path) = config.audit_log_path() {
        let sink = FileAuditSink::new(path)
            .with_context(|| format!("Failed to open audit log {}", path.display()))?;
        tracing::info!(path = %path.display(), "Audit events are also written to file");
        audit = audit.with_sink(Arc::new(sink));
    }

    let state = AppState {
        config: config.clone(),
        upload: UploadState {
            validator,
            staging_dir: config.staging_dir().to_path_buf(),
            storage,
        },
        scan: ScanConfig {
            client: scan_client,
            strict: config.clamav_strict(),
        },
        rate_limiter,
        tokens,
        delivery,
        documents: Arc::new(DirectoryDocumentSource::new(config.documents_dir())),
        audit,
    };

    Ok(Arc::new(state))
}
