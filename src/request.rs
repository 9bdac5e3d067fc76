//! Per-request records: [`ConversionRequest`] and [`ConversionResult`].

use std::{fmt, path::PathBuf};

use uuid::Uuid;

/// Identifier generated for every accepted upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// One stored upload. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub(crate) id: RequestId,
    pub(crate) original_name: String,
    pub(crate) storage_path: PathBuf,
    pub(crate) media_type: &'static str,
}

impl ConversionRequest {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// File name as stored (final path component of the submitted name).
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn storage_path(&self) -> &PathBuf {
        &self.storage_path
    }

    /// MIME type implied by the file extension.
    pub fn media_type(&self) -> &'static str {
        self.media_type
    }
}

/// A successful conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub request_id: RequestId,
    pub output_path: PathBuf,
    /// Frames processed. `None` when the engine cannot tell (delegated
    /// transcode).
    pub frame_count: Option<u64>,
    /// Size of every encoded frame, when known.
    pub frame_size: Option<(u32, u32)>,
}
