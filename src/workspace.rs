//! Scratch directory holding uploads and output artifacts.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use uuid::Uuid;

use crate::configuration::{OutputNaming, WorkspaceConfig};
use crate::error::ConvertError;
use crate::request::RequestId;

/// The shared directory in which inputs are stored and artifacts written.
///
/// The directory is created on the first write, never at construction.
#[derive(Debug, Clone)]
pub struct Workspace {
    config: WorkspaceConfig,
}

impl Workspace {
    pub fn new(config: WorkspaceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn directory(&self) -> &Path {
        &self.config.directory
    }

    /// Create the directory (and parents) if it does not exist yet.
    pub fn ensure(&self) -> Result<&Path, ConvertError> {
        let directory = self.directory();
        if !directory.is_dir() {
            log::debug!("Creating workspace directory {}", directory.display());
            fs::create_dir_all(directory)
                .map_err(|error| ConvertError::storage(directory, error))?;
        }
        Ok(directory)
    }

    /// Where an input named `file_name` is stored.
    pub fn input_path(&self, file_name: &str) -> PathBuf {
        self.directory().join(file_name)
    }

    /// Where the artifact for `request` is written.
    pub fn output_path(&self, request: &RequestId) -> PathBuf {
        match self.config.output_naming {
            OutputNaming::Fixed => self.directory().join(&self.config.output_file_name),
            OutputNaming::PerRequest => {
                let extension = Path::new(&self.config.output_file_name)
                    .extension()
                    .map(|extension| extension.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "gif".to_string());
                self.directory().join(format!("{request}.{extension}"))
            }
        }
    }

    /// Write `bytes` verbatim under `file_name`.
    ///
    /// The payload is staged under a unique hidden name and renamed into
    /// place, so an existing file of the same name survives a failed write.
    pub fn store(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ConvertError> {
        self.ensure()?;
        let path = self.input_path(file_name);
        let staging = self
            .directory()
            .join(format!(".{}.partial", Uuid::new_v4().simple()));

        if let Err(error) = fs::write(&staging, bytes).and_then(|_| fs::rename(&staging, &path)) {
            if let Err(cleanup_error) = fs::remove_file(&staging) {
                if cleanup_error.kind() != ErrorKind::NotFound {
                    log::debug!(
                        "Could not remove staged upload {}: {cleanup_error}",
                        staging.display()
                    );
                }
            }
            return Err(ConvertError::storage(path, error));
        }
        log::debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(path)
    }

    /// Remove `path` if it exists.
    ///
    /// Returns `Ok(false)` when there was nothing to remove.
    pub fn remove(&self, path: &Path) -> Result<bool, ConvertError> {
        match fs::remove_file(path) {
            Ok(()) => {
                log::debug!("Removed {}", path.display());
                Ok(true)
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(ConvertError::storage(path, error)),
        }
    }
}
