use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::UNIX_EPOCH;

#[derive(Debug, thiserror::Error)]
pub enum RateStoreError {
    #[error("rate store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("rate store encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("rate store lock poisoned")]
    Poisoned,
}

/// Persistence for sliding-window timestamps, keyed by an opaque hashed id.
///
/// Implementations need not be atomic across processes; the limiter
/// tolerates lost updates.
pub trait RateStore: Send + Sync {
    /// Stored timestamps (unix seconds) for `key`, empty when absent.
    fn load(&self, key: &str) -> Result<Vec<u64>, RateStoreError>;

    fn save(&self, key: &str, timestamps: &[u64]) -> Result<(), RateStoreError>;

    fn delete(&self, key: &str) -> Result<(), RateStoreError>;

    /// Remove records last written before `cutoff_secs`. Returns how many were removed.
    fn purge_older_than(&self, cutoff_secs: u64) -> Result<usize, RateStoreError>;
}

/// One JSON file per key under a shared directory.
///
/// Writes go to a temp file in the same directory and are renamed into place,
/// so readers never observe a partial record.
#[derive(Debug, Clone)]
pub struct FileRateStore {
    dir: PathBuf,
}

impl FileRateStore {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl RateStore for FileRateStore {
    fn load(&self, key: &str) -> Result<Vec<u64>, RateStoreError> {
        let path = self.record_path(key);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<Vec<u64>>(&raw) {
            Ok(timestamps) => Ok(timestamps),
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "Discarding corrupt rate record");
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, key: &str, timestamps: &[u64]) -> Result<(), RateStoreError> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer(&mut tmp, timestamps)?;
        tmp.flush()?;
        tmp.persist(self.record_path(key)).map_err(|e| e.error)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), RateStoreError> {
        match fs::remove_file(self.record_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn purge_older_than(&self, cutoff_secs: u64) -> Result<usize, RateStoreError> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs());
            if matches!(modified, Some(secs) if secs < cutoff_secs)
                && fs::remove_file(&path).is_ok()
            {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// In-process store for tests and single-instance deployments.
#[derive(Debug, Default)]
pub struct MemoryRateStore {
    records: Mutex<HashMap<String, Vec<u64>>>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RateStore for MemoryRateStore {
    fn load(&self, key: &str) -> Result<Vec<u64>, RateStoreError> {
        let records = self.records.lock().map_err(|_| RateStoreError::Poisoned)?;
        Ok(records.get(key).cloned().unwrap_or_default())
    }

    fn save(&self, key: &str, timestamps: &[u64]) -> Result<(), RateStoreError> {
        let mut records = self.records.lock().map_err(|_| RateStoreError::Poisoned)?;
        records.insert(key.to_string(), timestamps.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), RateStoreError> {
        let mut records = self.records.lock().map_err(|_| RateStoreError::Poisoned)?;
        records.remove(key);
        Ok(())
    }

    /// A record's last write time is its newest timestamp.
    fn purge_older_than(&self, cutoff_secs: u64) -> Result<usize, RateStoreError> {
        let mut records = self.records.lock().map_err(|_| RateStoreError::Poisoned)?;
        let before = records.len();
        records.retain(|_, ts| ts.iter().max().is_some_and(|&newest| newest >= cutoff_secs));
        Ok(before - records.len())
    }
}
