//! Security audit trail
//!
//! Rejected uploads, detected malware, unavailable scans, rate-limit trips,
//! path traversal attempts, refused tokens and accepted uploads are recorded
//! as structured events. Every event goes to the `audit` tracing target; an
//! optional JSON-lines file receives a copy.

use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    UploadRejected,
    MalwareDetected,
    ScanUnavailable,
    RateLimited,
    PathTraversal,
    TokenRejected,
    UploadAccepted,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::UploadRejected => "upload_rejected",
            AuditEventType::MalwareDetected => "malware_detected",
            AuditEventType::ScanUnavailable => "scan_unavailable",
            AuditEventType::RateLimited => "rate_limited",
            AuditEventType::PathTraversal => "path_traversal",
            AuditEventType::TokenRejected => "token_rejected",
            AuditEventType::UploadAccepted => "upload_accepted",
        }
    }
}

/// Structured audit log entry
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub event_type: AuditEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<u64>,
    /// Requested or stored file name, as seen by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Short reason, e.g. `disallowed_type` or a signature name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            event_type,
            client_ip: None,
            subject_id: None,
            file_name: None,
            reason: None,
        }
    }

    pub fn client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }

    pub fn subject_id(mut self, subject_id: u64) -> Self {
        self.subject_id = Some(subject_id);
        self
    }

    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Append-only destination for audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Emits events on the `audit` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        match event.event_type {
            AuditEventType::UploadAccepted => tracing::info!(
                target: "audit",
                event_type = event.event_type.as_str(),
                client_ip = ?event.client_ip,
                subject_id = ?event.subject_id,
                file_name = ?event.file_name,
                "Upload accepted"
            ),
            _ => tracing::warn!(
                target: "audit",
                event_type = event.event_type.as_str(),
                client_ip = ?event.client_ip,
                subject_id = ?event.subject_id,
                file_name = ?event.file_name,
                reason = ?event.reason,
                "Security event"
            ),
        }
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct FileAuditSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileAuditSink {
    /// Opens (creating if needed) the audit file once to surface permission problems at startup.
    pub fn new(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{}", line)
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: &AuditEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize audit event");
                return;
            }
        };
        if let Err(e) = self.append(&line) {
            tracing::error!(error = %e, path = %self.path.display(), "Failed to write audit event");
        }
    }
}

/// Fan-out over every configured sink.
#[derive(Clone)]
pub struct AuditLog {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl AuditLog {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }

    pub fn tracing_only() -> Self {
        Self::new(vec![Arc::new(TracingAuditSink)])
    }

    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn record(&self, event: AuditEvent) {
        for sink in &self.sinks {
            sink.record(&event);
        }
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
