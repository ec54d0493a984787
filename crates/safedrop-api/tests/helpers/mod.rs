//! Test helpers: build AppState and router around temp directories.
//!
//! Run from workspace root: `cargo test -p safedrop-api`.

pub mod clamd;

use axum_test::TestServer;
use safedrop_api::constants;
use safedrop_api::setup::{routes, services};
use safedrop_api::AppState;
use safedrop_core::{BaseConfig, Config, ManualClock, UploadServiceConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_TOKEN_SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const START_TIME: u64 = 1_700_000_000;

/// API path prefix for tests (e.g. `/api/v0`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

/// Knobs that differ between tests.
#[derive(Debug, Clone)]
pub struct TestOptions {
    pub max_upload_size_bytes: usize,
    /// `Some((port, strict))` enables scanning against a daemon on localhost.
    pub clamav: Option<(u16, bool)>,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
    /// Tests default to one proxy so `X-Forwarded-For` picks the caller.
    pub trusted_proxy_count: usize,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            max_upload_size_bytes: 10 * 1024 * 1024,
            clamav: None,
            rate_limit_max_requests: 100,
            rate_limit_window_secs: 60,
            trusted_proxy_count: 1,
        }
    }
}

/// Test application: server, state and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
    pub _temp_dir: TempDir,
    root: PathBuf,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn storage_root(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(".staging")
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.root.join("documents")
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.root.join("audit.jsonl")
    }

    /// Event types recorded in the audit file, in order.
    pub fn audit_events(&self) -> Vec<String> {
        std::fs::read_to_string(self.audit_log_path())
            .unwrap_or_default()
            .lines()
            .map(|line| {
                let event: serde_json::Value = serde_json::from_str(line).unwrap();
                event["event_type"].as_str().unwrap().to_string()
            })
            .collect()
    }

    pub fn stored_files(&self) -> Vec<String> {
        list_dir(&self.storage_root())
    }

    pub fn staged_files(&self) -> Vec<String> {
        list_dir(&self.staging_dir())
    }
}

fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

pub fn create_test_config(root: &Path, options: &TestOptions) -> Config {
    let (clamav_enabled, clamav_port, clamav_strict) = match options.clamav {
        Some((port, strict)) => (true, port, strict),
        None => (false, 3310, false),
    };

    Config::new(UploadServiceConfig {
        base: BaseConfig {
            server_port: 0,
            cors_origins: vec!["*".to_string()],
            environment: "test".to_string(),
            trusted_proxy_count: options.trusted_proxy_count,
        },
        storage_root: root.join("uploads"),
        staging_dir: root.join(".staging"),
        documents_dir: root.join("documents"),
        max_upload_size_bytes: options.max_upload_size_bytes,
        upload_allowed_types: vec![
            ("image/jpeg".to_string(), "jpg".to_string()),
            ("image/png".to_string(), "png".to_string()),
            ("application/pdf".to_string(), "pdf".to_string()),
        ],
        download_allowed_types: vec![
            ("jpg".to_string(), "image/jpeg".to_string()),
            ("png".to_string(), "image/png".to_string()),
            ("pdf".to_string(), "application/pdf".to_string()),
        ],
        clamav_enabled,
        clamav_host: "127.0.0.1".to_string(),
        clamav_port,
        clamav_timeout_secs: 2,
        clamav_strict,
        token_secret: TEST_TOKEN_SECRET.to_string(),
        token_lifetime_secs: 3600,
        rate_limit_dir: root.join(".ratelimit"),
        rate_limit_max_requests: options.rate_limit_max_requests,
        rate_limit_window_secs: options.rate_limit_window_secs,
        rate_limit_gc_percent: 0,
        audit_log_path: Some(root.join("audit.jsonl")),
    })
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(TestOptions::default()).await
}

/// Setup test app with isolated directories and a manual clock.
pub async fn setup_test_app_with(options: TestOptions) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let root = temp_dir.path().to_path_buf();
    let config = create_test_config(&root, &options);
    config.validate().expect("Test config should be valid");

    std::fs::create_dir_all(root.join("documents")).expect("Failed to create documents dir");

    let clock = Arc::new(ManualClock::new(START_TIME));
    let state = services::build_state(&config, clock.clone())
        .await
        .expect("Failed to build state");
    let app = routes::setup_routes(&config, state.clone()).expect("Failed to setup routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        clock,
        _temp_dir: temp_dir,
        root,
    }
}

/// A PNG signature followed by filler, `size` bytes in total.
pub fn png_bytes(size: usize) -> Vec<u8> {
    let mut data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    data.resize(size.max(data.len()), 0xAB);
    data
}

pub fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.7\n1 0 obj << /Type /Catalog >> endobj\n%%EOF\n".to_vec()
}
