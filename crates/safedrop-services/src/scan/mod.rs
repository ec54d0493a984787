//! Malware scanning over the clamd INSTREAM protocol.

pub mod protocol;

use std::fs::File;
use std::io::{BufReader, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const DEFAULT_CHUNK_SIZE: usize = 8192;
const PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of one scan attempt.
///
/// `Unknown` means the scan did not complete; it is never treated as clean or
/// infected by this client. The caller's policy decides what to do with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    Clean,
    Infected(String),
    Unknown(String),
}

impl ScanResult {
    /// Tri-state clean flag: `Some(true)` clean, `Some(false)` infected, `None` unknown.
    pub fn is_clean(&self) -> Option<bool> {
        match self {
            ScanResult::Clean => Some(true),
            ScanResult::Infected(_) => Some(false),
            ScanResult::Unknown(_) => None,
        }
    }

    pub fn signature(&self) -> Option<&str> {
        match self {
            ScanResult::Infected(name) => Some(name),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ScanResult::Unknown(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Client for a clamd-compatible scanning daemon.
///
/// All I/O is blocking and bounded by the configured timeout. From async code
/// use [`ScanClient::scan_file`] and [`ScanClient::ping_async`], which move the
/// work onto the blocking pool.
#[derive(Debug, Clone)]
pub struct ScanClient {
    host: String,
    port: u16,
    timeout: Duration,
    chunk_size: usize,
}

impl ScanClient {
    pub fn new(host: String, port: u16) -> Self {
        Self::with_timeout(host, port, 30)
    }

    pub fn with_timeout(host: String, port: u16, timeout_secs: u64) -> Self {
        Self {
            host,
            port,
            timeout: Duration::from_secs(timeout_secs),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn connect(&self, timeout: Duration) -> std::io::Result<TcpStream> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port).to_socket_addrs()?.collect();
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no address resolved for {}", self.address()),
            )
        }))
    }

    /// Scan a file on disk.
    pub fn scan_path(&self, path: &Path) -> ScanResult {
        match File::open(path) {
            Ok(file) => self.scan_reader(file),
            Err(e) => {
                tracing::error!(error = %e, path = %path.display(), "Failed to open file for scanning");
                ScanResult::Unknown(format!("failed to open file: {}", e))
            }
        }
    }

    pub fn scan_bytes(&self, data: &[u8]) -> ScanResult {
        self.scan_reader(data)
    }

    /// Stream `reader` to the daemon and interpret its verdict.
    ///
    /// The socket is dropped on every return path.
    pub fn scan_reader<R: Read>(&self, mut reader: R) -> ScanResult {
        let start = Instant::now();
        tracing::debug!(host = %self.host, port = %self.port, "Starting ClamAV scan");

        let mut stream = match self.connect(self.timeout) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(error = %e, address = %self.address(), "ClamAV connection failed");
                return ScanResult::Unknown(format!("connection failed: {}", e));
            }
        };

        let bytes_sent = match protocol::write_instream(&mut reader, &mut stream, self.chunk_size) {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(error = %e, "ClamAV stream failed");
                return ScanResult::Unknown(format!("stream failed: {}", e));
            }
        };

        let reply = match protocol::read_reply(BufReader::new(&stream)) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read ClamAV response");
                return ScanResult::Unknown(format!("failed to read response: {}", e));
            }
        };

        let result = protocol::parse_response(&reply);
        match &result {
            ScanResult::Clean => tracing::info!(
                duration_ms = start.elapsed().as_millis(),
                bytes = bytes_sent,
                "File scan completed: clean"
            ),
            ScanResult::Infected(virus) => tracing::warn!(
                duration_ms = start.elapsed().as_millis(),
                virus = %virus,
                "File scan detected virus"
            ),
            ScanResult::Unknown(msg) => tracing::error!(
                duration_ms = start.elapsed().as_millis(),
                error = %msg,
                "Failed to parse ClamAV response"
            ),
        }
        result
    }

    /// Liveness check with a short timeout. Diagnostics only.
    pub fn ping(&self) -> bool {
        let timeout = self.timeout.min(PING_TIMEOUT);
        let result = self.connect(timeout).and_then(|mut stream| {
            std::io::Write::write_all(&mut stream, protocol::PING_COMMAND)?;
            protocol::read_reply(BufReader::new(&stream))
        });

        match result {
            Ok(reply) if reply == protocol::PONG_REPLY => true,
            Ok(reply) => {
                tracing::warn!(reply = %reply, "Unexpected ClamAV ping reply");
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, address = %self.address(), "ClamAV ping failed");
                false
            }
        }
    }

    /// Scan a staged file on the blocking thread pool.
    pub async fn scan_file(&self, path: PathBuf) -> ScanResult {
        let client = self.clone();
        match tokio::task::spawn_blocking(move || client.scan_path(&path)).await {
            Ok(result) => result,
            Err(e) => {
                let error_msg = format!("ClamAV scan task join error: {}", e);
                tracing::error!(error = %error_msg, "ClamAV scan panicked");
                ScanResult::Unknown(error_msg)
            }
        }
    }

    pub async fn ping_async(&self) -> bool {
        let client = self.clone();
        tokio::task::spawn_blocking(move || client.ping())
            .await
            .unwrap_or(false)
    }
}
