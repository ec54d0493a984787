use crate::error::DeliveryError;
use std::path::{Path, PathBuf};

/// A requested file that passed every delivery check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Canonical absolute path inside the storage root.
    pub path: PathBuf,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
}

/// Guards raw-file downloads from the public storage root.
///
/// Only bare file names are accepted. The joined path is canonicalized and
/// must remain under the canonical root, which also defeats symlinks that
/// point elsewhere.
#[derive(Debug, Clone)]
pub struct DeliveryGuard {
    root: PathBuf,
    /// Extension -> response MIME type
    allowed_types: Vec<(String, String)>,
}

impl DeliveryGuard {
    pub fn new(
        root: impl AsRef<Path>,
        allowed_types: Vec<(String, String)>,
    ) -> Result<Self, DeliveryError> {
        let root = root.as_ref().canonicalize()?;
        Ok(Self {
            root,
            allowed_types,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Response MIME type for an extension, case-insensitively.
    pub fn content_type_for(&self, extension: &str) -> Option<&str> {
        self.allowed_types
            .iter()
            .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
            .map(|(_, mime)| mime.as_str())
    }

    pub fn resolve(&self, requested_name: &str) -> Result<ResolvedFile, DeliveryError> {
        if requested_name.is_empty()
            || requested_name.contains("..")
            || requested_name.contains(['/', '\\', '\0'])
        {
            return Err(DeliveryError::InvalidName(requested_name.to_string()));
        }

        let extension = Path::new(requested_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let content_type = self
            .content_type_for(extension)
            .ok_or_else(|| DeliveryError::DisallowedExtension(extension.to_string()))?
            .to_string();

        let candidate = self.root.join(requested_name);
        let canonical = match candidate.canonicalize() {
            Ok(path) => path,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DeliveryError::NotFound(requested_name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        if canonical.strip_prefix(&self.root).is_err() {
            return Err(DeliveryError::OutsideRoot(requested_name.to_string()));
        }

        let metadata = std::fs::metadata(&canonical)?;
        if !metadata.is_file() {
            return Err(DeliveryError::NotFound(requested_name.to_string()));
        }

        Ok(ResolvedFile {
            path: canonical,
            file_name: requested_name.to_string(),
            content_type,
            size: metadata.len(),
        })
    }
}
