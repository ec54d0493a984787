use crate::error::{StorageError, StorageResult};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Public upload directory.
///
/// Files only enter it through [`LocalStorage::commit`], after validation and
/// scanning have passed on the staged copy.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance, creating the directory if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn name_to_path(&self, stored_name: &str) -> StorageResult<PathBuf> {
        if stored_name.is_empty()
            || stored_name.starts_with('.')
            || stored_name.contains("..")
            || stored_name.contains(['/', '\\', '\0'])
        {
            return Err(StorageError::InvalidName(stored_name.to_string()));
        }
        Ok(self.base_path.join(stored_name))
    }

    /// Move a staged file into the storage root as `stored_name`.
    ///
    /// Uses a rename when staging and storage share a filesystem. Otherwise the
    /// bytes are copied to a hidden sibling and renamed into place, so the final
    /// name never refers to a partially written file. An existing file with the
    /// same name is replaced.
    pub async fn commit(&self, staged: &Path, stored_name: &str) -> StorageResult<PathBuf> {
        let target = self.name_to_path(stored_name)?;
        let start = std::time::Instant::now();

        if let Err(rename_err) = fs::rename(staged, &target).await {
            tracing::debug!(
                error = %rename_err,
                "Rename into storage failed, falling back to copy"
            );
            let partial = self.base_path.join(format!(".{}.partial", stored_name));
            if let Err(e) = fs::copy(staged, &partial).await {
                let _ = fs::remove_file(&partial).await;
                return Err(StorageError::CommitFailed(format!(
                    "Failed to copy {} into storage: {}",
                    staged.display(),
                    e
                )));
            }
            if let Err(e) = fs::rename(&partial, &target).await {
                let _ = fs::remove_file(&partial).await;
                return Err(StorageError::CommitFailed(format!(
                    "Failed to finalize {}: {}",
                    target.display(),
                    e
                )));
            }
            if let Err(e) = fs::remove_file(staged).await {
                tracing::warn!(error = %e, path = %staged.display(), "Failed to remove staged upload");
            }
        }

        tracing::info!(
            path = %target.display(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage commit successful"
        );

        Ok(target)
    }

    pub async fn exists(&self, stored_name: &str) -> bool {
        match self.name_to_path(stored_name) {
            Ok(path) => fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    pub async fn delete(&self, stored_name: &str) -> StorageResult<()> {
        let path = self.name_to_path(stored_name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
