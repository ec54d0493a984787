//! Configuration module
//!
//! This module provides the configuration structures for the upload service:
//! HTTP settings, storage directories, content allow-lists, scanning daemon,
//! token signing and rate limiting.

use std::env;
use std::path::PathBuf;

// Common constants
const SERVER_PORT: u16 = 4000;
const MAX_UPLOAD_SIZE_MB: usize = 10;
const CLAMAV_PORT: u16 = 3310;
const CLAMAV_TIMEOUT_SECS: u64 = 30;
const TOKEN_LIFETIME_SECS: u64 = 3600;
const RATE_LIMIT_MAX_REQUESTS: u32 = 30;
const RATE_LIMIT_WINDOW_SECS: u64 = 60;
const RATE_LIMIT_GC_PERCENT: u8 = 1;
/// Direct connections by default; forwarding headers are ignored.
const TRUSTED_PROXY_COUNT: usize = 0;

/// Minimum accepted length of the token signing secret, in bytes.
pub const MIN_TOKEN_SECRET_LEN: usize = 32;

const DEFAULT_UPLOAD_ALLOWED_TYPES: &str =
    "image/jpeg:jpg,image/png:png,image/gif:gif,image/webp:webp,application/pdf:pdf";
const DEFAULT_DOWNLOAD_ALLOWED_TYPES: &str =
    "jpg:image/jpeg,png:image/png,gif:image/gif,webp:image/webp,pdf:application/pdf";

/// Base HTTP configuration
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub trusted_proxy_count: usize,
}

/// Upload service configuration
#[derive(Clone, Debug)]
pub struct UploadServiceConfig {
    pub base: BaseConfig,
    // Storage
    pub storage_root: PathBuf,
    pub staging_dir: PathBuf,
    pub documents_dir: PathBuf,
    // Content validation
    pub max_upload_size_bytes: usize,
    /// Detected MIME type -> canonical extension
    pub upload_allowed_types: Vec<(String, String)>,
    /// Extension -> response MIME type
    pub download_allowed_types: Vec<(String, String)>,
    // ClamAV configuration
    pub clamav_enabled: bool,
    pub clamav_host: String,
    pub clamav_port: u16,
    pub clamav_timeout_secs: u64,
    pub clamav_strict: bool,
    // Token signing
    pub token_secret: String,
    pub token_lifetime_secs: u64,
    // Rate limiting
    pub rate_limit_dir: PathBuf,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_gc_percent: u8,
    // Audit
    pub audit_log_path: Option<PathBuf>,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<UploadServiceConfig>);

impl Config {
    pub fn new(inner: UploadServiceConfig) -> Self {
        Config(Box::new(inner))
    }

    fn inner(&self) -> &UploadServiceConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_name(&self.inner().base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = UploadServiceConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn trusted_proxy_count(&self) -> usize {
        self.inner().base.trusted_proxy_count
    }

    pub fn storage_root(&self) -> &std::path::Path {
        &self.inner().storage_root
    }

    pub fn staging_dir(&self) -> &std::path::Path {
        &self.inner().staging_dir
    }

    pub fn documents_dir(&self) -> &std::path::Path {
        &self.inner().documents_dir
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.inner().max_upload_size_bytes
    }

    pub fn upload_allowed_types(&self) -> &[(String, String)] {
        &self.inner().upload_allowed_types
    }

    pub fn download_allowed_types(&self) -> &[(String, String)] {
        &self.inner().download_allowed_types
    }

    pub fn clamav_enabled(&self) -> bool {
        self.inner().clamav_enabled
    }

    pub fn clamav_host(&self) -> &str {
        &self.inner().clamav_host
    }

    pub fn clamav_port(&self) -> u16 {
        self.inner().clamav_port
    }

    pub fn clamav_timeout_secs(&self) -> u64 {
        self.inner().clamav_timeout_secs
    }

    pub fn clamav_strict(&self) -> bool {
        self.inner().clamav_strict
    }

    pub fn token_secret(&self) -> &str {
        &self.inner().token_secret
    }

    pub fn token_lifetime_secs(&self) -> u64 {
        self.inner().token_lifetime_secs
    }

    pub fn rate_limit_dir(&self) -> &std::path::Path {
        &self.inner().rate_limit_dir
    }

    pub fn rate_limit_max_requests(&self) -> u32 {
        self.inner().rate_limit_max_requests
    }

    pub fn rate_limit_window_secs(&self) -> u64 {
        self.inner().rate_limit_window_secs
    }

    pub fn rate_limit_gc_percent(&self) -> u8 {
        self.inner().rate_limit_gc_percent
    }

    pub fn audit_log_path(&self) -> Option<&std::path::Path> {
        self.inner().audit_log_path.as_deref()
    }
}

fn is_production_name(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

/// Environment lookup, injectable so parsing can be exercised without the
/// process environment.
trait EnvSource {
    fn get(&self, name: &str) -> Option<String>;
}

struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }
}

impl<F: Fn(&str) -> Option<String>> EnvSource for F {
    fn get(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// Parse `name` when set; `default` only when unset.
fn env_parse<T: std::str::FromStr>(
    vars: &dyn EnvSource,
    name: &str,
    default: T,
) -> Result<T, anyhow::Error> {
    match vars.get(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value '{}'", name, raw)),
    }
}

fn env_bool(vars: &dyn EnvSource, name: &str, default: bool) -> Result<bool, anyhow::Error> {
    match vars.get(name) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(anyhow::anyhow!(
                "{} must be a boolean (true/false/1/0/yes/no/on/off), got '{}'",
                name,
                raw
            )),
        },
    }
}

/// Parse a `left:right,left:right` list into lowercase pairs.
///
/// Entries without a colon or with an empty side are rejected so a typo does not
/// silently widen or narrow an allow-list.
pub fn parse_pair_list(raw: &str) -> Result<Vec<(String, String)>, anyhow::Error> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (left, right) = entry
                .split_once(':')
                .ok_or_else(|| anyhow::anyhow!("Invalid allow-list entry '{}'", entry))?;
            let left = left.trim().to_lowercase();
            let right = right.trim().trim_start_matches('.').to_lowercase();
            if left.is_empty() || right.is_empty() {
                return Err(anyhow::anyhow!("Invalid allow-list entry '{}'", entry));
            }
            Ok((left, right))
        })
        .collect()
}

impl UploadServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_source(&ProcessEnv)
    }

    fn from_source(vars: &dyn EnvSource) -> Result<Self, anyhow::Error> {
        let environment = vars
            .get("ENVIRONMENT")
            .or_else(|| vars.get("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());
        let is_production = is_production_name(&environment);

        let cors_origins_str = vars.get("CORS_ORIGINS").unwrap_or_else(|| "*".to_string());
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let base = BaseConfig {
            server_port: env_parse(vars, "PORT", SERVER_PORT)?,
            cors_origins,
            environment,
            trusted_proxy_count: env_parse(vars, "TRUSTED_PROXY_COUNT", TRUSTED_PROXY_COUNT)?,
        };

        let storage_root = vars
            .get("STORAGE_ROOT")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow::anyhow!("STORAGE_ROOT must be set"))?;
        let staging_dir = vars.get("STAGING_DIR").map(PathBuf::from).unwrap_or_else(|| {
            storage_root
                .parent()
                .map(|p| p.join(".staging"))
                .unwrap_or_else(|| PathBuf::from(".staging"))
        });
        let rate_limit_dir = vars
            .get("RATE_LIMIT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                staging_dir
                    .parent()
                    .map(|p| p.join(".ratelimit"))
                    .unwrap_or_else(|| PathBuf::from(".ratelimit"))
            });

        let max_upload_size_mb: usize = env_parse(vars, "MAX_UPLOAD_SIZE_MB", MAX_UPLOAD_SIZE_MB)?;

        let config = UploadServiceConfig {
            base,
            storage_root,
            staging_dir,
            documents_dir: vars
                .get("DOCUMENTS_DIR")
                .map(PathBuf::from)
                .ok_or_else(|| anyhow::anyhow!("DOCUMENTS_DIR must be set"))?,
            max_upload_size_bytes: max_upload_size_mb
                .checked_mul(1024 * 1024)
                .ok_or_else(|| anyhow::anyhow!("MAX_UPLOAD_SIZE_MB is too large"))?,
            upload_allowed_types: parse_pair_list(
                &vars
                    .get("UPLOAD_ALLOWED_TYPES")
                    .unwrap_or_else(|| DEFAULT_UPLOAD_ALLOWED_TYPES.to_string()),
            )?,
            download_allowed_types: parse_pair_list(
                &vars
                    .get("DOWNLOAD_ALLOWED_TYPES")
                    .unwrap_or_else(|| DEFAULT_DOWNLOAD_ALLOWED_TYPES.to_string()),
            )?,
            clamav_enabled: env_bool(vars, "CLAMAV_ENABLED", false)?,
            clamav_host: vars
                .get("CLAMAV_HOST")
                .unwrap_or_else(|| "localhost".to_string()),
            clamav_port: env_parse(vars, "CLAMAV_PORT", CLAMAV_PORT)?,
            clamav_timeout_secs: env_parse(vars, "CLAMAV_TIMEOUT_SECS", CLAMAV_TIMEOUT_SECS)?,
            clamav_strict: env_bool(vars, "CLAMAV_STRICT", is_production)?,
            token_secret: vars
                .get("TOKEN_SECRET")
                .ok_or_else(|| anyhow::anyhow!("TOKEN_SECRET must be set for download tokens"))?,
            token_lifetime_secs: env_parse(vars, "TOKEN_LIFETIME_SECS", TOKEN_LIFETIME_SECS)?,
            rate_limit_dir,
            rate_limit_max_requests: env_parse(
                vars,
                "RATE_LIMIT_MAX_REQUESTS",
                RATE_LIMIT_MAX_REQUESTS,
            )?,
            rate_limit_window_secs: env_parse(
                vars,
                "RATE_LIMIT_WINDOW_SECS",
                RATE_LIMIT_WINDOW_SECS,
            )?,
            rate_limit_gc_percent: env_parse(vars, "RATE_LIMIT_GC_PERCENT", RATE_LIMIT_GC_PERCENT)?,
            audit_log_path: vars
                .get("AUDIT_LOG_PATH")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.token_secret.len() < MIN_TOKEN_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "TOKEN_SECRET must be at least {} characters long",
                MIN_TOKEN_SECRET_LEN
            ));
        }

        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB cannot be 0"));
        }

        if self.upload_allowed_types.is_empty() {
            return Err(anyhow::anyhow!("UPLOAD_ALLOWED_TYPES cannot be empty"));
        }

        if self.download_allowed_types.is_empty() {
            return Err(anyhow::anyhow!("DOWNLOAD_ALLOWED_TYPES cannot be empty"));
        }

        if self.rate_limit_max_requests == 0 {
            return Err(anyhow::anyhow!("RATE_LIMIT_MAX_REQUESTS cannot be 0"));
        }

        if self.rate_limit_window_secs == 0 {
            return Err(anyhow::anyhow!("RATE_LIMIT_WINDOW_SECS cannot be 0"));
        }

        if self.rate_limit_gc_percent > 100 {
            return Err(anyhow::anyhow!("RATE_LIMIT_GC_PERCENT must be between 0 and 100"));
        }

        if self.clamav_enabled && self.clamav_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "CLAMAV_TIMEOUT_SECS cannot be 0 when ClamAV is enabled"
            ));
        }

        // Uploads are staged outside the public root until they pass every check.
        if self.staging_dir.starts_with(&self.storage_root) {
            return Err(anyhow::anyhow!(
                "STAGING_DIR must not be inside STORAGE_ROOT"
            ));
        }

        Ok(())
    }
}
