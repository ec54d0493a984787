//! Operator commands over the same components the HTTP service uses.
//!
//! Every command reads the service configuration from the environment, so
//! tokens issued here validate on the server and rate limit state is shared
//! through the same directory.

use anyhow::Context;
use safedrop_core::{Clock, Config, SystemClock};
use safedrop_services::{FileRateStore, RateLimiter, ScanClient, ScanResult, TokenIssuer};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub subject_id: u64,
    pub expires_in_secs: u64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct TokenCheck {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<u64>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PingReport {
    pub address: String,
    pub reachable: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ScanReport {
    pub path: String,
    /// `clean`, `infected` or `unknown`
    pub result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.result == "clean"
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct RateStatus {
    pub identifier: String,
    pub limit: u32,
    pub remaining: u32,
    pub retry_after_secs: u64,
}

pub fn token_issuer(config: &Config, clock: Arc<dyn Clock>) -> anyhow::Result<TokenIssuer> {
    TokenIssuer::new(
        config.token_secret().as_bytes(),
        config.token_lifetime_secs(),
        clock,
    )
    .context("Invalid token configuration")
}

pub fn rate_limiter(config: &Config, clock: Arc<dyn Clock>) -> anyhow::Result<RateLimiter> {
    let store = FileRateStore::new(config.rate_limit_dir()).with_context(|| {
        format!(
            "Failed to open rate limit directory {}",
            config.rate_limit_dir().display()
        )
    })?;
    Ok(RateLimiter::new(
        Arc::new(store),
        clock,
        config.rate_limit_max_requests(),
        config.rate_limit_window_secs(),
    )
    .with_gc_percent(0))
}

pub fn scan_client(config: &Config) -> ScanClient {
    ScanClient::with_timeout(
        config.clamav_host().to_string(),
        config.clamav_port(),
        config.clamav_timeout_secs(),
    )
}

pub fn issue_token(
    issuer: &TokenIssuer,
    subject_id: u64,
    lifetime_secs: Option<u64>,
) -> anyhow::Result<IssuedToken> {
    if subject_id == 0 {
        anyhow::bail!("Subject id must be a positive integer");
    }
    let lifetime = lifetime_secs.unwrap_or_else(|| issuer.default_lifetime_secs());
    if lifetime == 0 {
        anyhow::bail!("Token lifetime must be greater than 0");
    }
    Ok(IssuedToken {
        token: issuer.generate_with_lifetime(subject_id, lifetime),
        subject_id,
        expires_in_secs: lifetime,
    })
}

pub fn verify_token(issuer: &TokenIssuer, token: &str) -> TokenCheck {
    let subject_id = issuer.validate(token);
    TokenCheck {
        valid: subject_id.is_some(),
        subject_id,
    }
}

pub fn scan_path(client: &ScanClient, path: &Path) -> anyhow::Result<ScanReport> {
    if !path.is_file() {
        anyhow::bail!("{} is not a readable file", path.display());
    }
    let result = client.scan_path(path);
    let (label, signature, error) = match result {
        ScanResult::Clean => ("clean", None, None),
        ScanResult::Infected(name) => ("infected", Some(name), None),
        ScanResult::Unknown(msg) => ("unknown", None, Some(msg)),
    };
    Ok(ScanReport {
        path: path.display().to_string(),
        result: label,
        signature,
        error,
    })
}

pub fn rate_status(limiter: &RateLimiter, identifier: &str) -> RateStatus {
    RateStatus {
        identifier: identifier.to_string(),
        limit: limiter.max_requests(),
        remaining: limiter.remaining(identifier),
        retry_after_secs: limiter.retry_after_secs(identifier),
    }
}

/// Default clock for commands run against live state.
pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

/// Initialize tracing for the CLI. Logs go to stderr so stdout stays JSON.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}
