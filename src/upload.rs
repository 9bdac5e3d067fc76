//! Upload boundary.
//!
//! An [`Upload`] is the named binary blob a caller hands over. The
//! [`UploadPolicy`] decides whether it may enter the workflow at all; the
//! workflow itself never looks at extensions.

use std::{fmt, path::Path};

use crate::error::ConvertError;

/// Container extensions accepted by default.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv"];

/// One uploaded file.
#[derive(Clone)]
pub struct Upload {
    /// File name as submitted by the caller.
    pub name: String,
    /// Raw payload.
    pub bytes: Vec<u8>,
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read an upload from a local file, keeping its file name.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let name = stored_file_name(&path.to_string_lossy()).ok_or(ConvertError::NoFileProvided)?;
        let bytes = std::fs::read(path).map_err(|error| ConvertError::storage(path, error))?;
        Ok(Self { name, bytes })
    }

    /// Lower-cased extension of the submitted name, if any.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }
}

/// Which uploads are accepted.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    /// Lower-case extensions without the leading dot.
    pub allowed_extensions: Vec<String>,
    /// Maximum payload size in bytes. `None` means unlimited.
    pub max_bytes: Option<u64>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|extension| extension.to_string())
                .collect(),
            max_bytes: None,
        }
    }
}

impl UploadPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the allowed extension set. Leading dots and case are ignored.
    #[must_use]
    pub fn with_allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_extensions = extensions
            .into_iter()
            .map(|extension| extension.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|extension| !extension.is_empty())
            .collect();
        self
    }

    #[must_use]
    pub fn with_max_bytes(mut self, limit: Option<u64>) -> Self {
        self.max_bytes = limit;
        self
    }

    /// Whether `extension` is in the allowed set.
    pub fn allows_extension(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.');
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }

    /// Check an optional upload and pass it through when acceptable.
    ///
    /// # Errors
    ///
    /// [`ConvertError::NoFileProvided`] for a missing upload,
    /// [`ConvertError::UnsupportedExtension`] for a name outside the allowed
    /// set, and [`ConvertError::PayloadTooLarge`] when over the size limit.
    pub fn accept(&self, upload: Option<Upload>) -> Result<Upload, ConvertError> {
        let upload = upload.ok_or(ConvertError::NoFileProvided)?;

        let allowed = upload
            .extension()
            .is_some_and(|extension| self.allows_extension(&extension));
        if !allowed {
            log::debug!("Rejecting upload {:?}: extension not allowed", upload.name);
            return Err(ConvertError::UnsupportedExtension {
                name: upload.name,
                allowed: self.allowed_extensions.join(", "),
            });
        }

        if let Some(limit) = self.max_bytes {
            let size = upload.bytes.len() as u64;
            if size > limit {
                return Err(ConvertError::PayloadTooLarge { size, limit });
            }
        }

        Ok(upload)
    }
}

/// The name an upload is stored under: the final path component only.
///
/// Returns `None` when nothing usable is left (empty names, `..`, a bare
/// directory separator).
pub fn stored_file_name(name: &str) -> Option<String> {
    let normalized = name.replace('\\', "/");
    let candidate = normalized.rsplit('/').next()?.trim();
    if candidate.is_empty() || candidate == "." || candidate == ".." {
        return None;
    }
    Some(candidate.to_string())
}

/// Media type declared by an upload's extension.
pub fn media_type_for(name: &str) -> &'static str {
    match extension_of(name).as_deref() {
        Some("mp4" | "m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("avi") => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

fn extension_of(name: &str) -> Option<String> {
    let file_name = stored_file_name(name)?;
    Path::new(&file_name)
        .extension()
        .map(|extension| extension.to_string_lossy().to_ascii_lowercase())
}
