//! Configuration validation
//!
//! Validates configuration at startup to catch misconfigurations early.

use anyhow::Result;
use safedrop_core::Config;

/// Fail on settings that are invalid; warn on settings that weaken the upload pipeline.
pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    let is_production = config.is_production();

    if is_production && config.cors_origins().iter().any(|o| o == "*") {
        return Err(anyhow::anyhow!(
            "CORS configured to allow all origins (*) in production - this is a security risk. \
            Please set specific allowed origins via CORS_ORIGINS environment variable."
        ));
    }

    if config.trusted_proxy_count() > 10 {
        tracing::warn!(
            trusted_proxy_count = config.trusted_proxy_count(),
            "TRUSTED_PROXY_COUNT is very high - ensure this matches your actual proxy setup"
        );
    }

    if is_production && !config.clamav_enabled() {
        tracing::warn!("Malware scanning is disabled in production");
    }

    if is_production && config.clamav_enabled() && !config.clamav_strict() {
        tracing::warn!(
            "CLAMAV_STRICT is off in production - uploads are accepted when scanning fails"
        );
    }

    Ok(())
}
