//! Handing the finished artifact back to the caller.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::PathBuf;

use base64::{Engine as _, engine::general_purpose::STANDARD};

/// A converted artifact ready for display or download.
#[derive(Clone)]
pub struct Delivery {
    /// Name offered for download.
    pub file_name: String,
    pub mime_type: &'static str,
    /// Where the artifact lives in the workspace.
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl Debug for Delivery {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Delivery")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("path", &self.path)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Delivery {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `data:` URI for embedding the artifact inline, e.g. in an `<img>` tag.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }

    /// `Content-Disposition` header value offering the artifact as a download.
    pub fn content_disposition(&self) -> String {
        let escaped = self.file_name.replace('\\', "\\\\").replace('"', "\\\"");
        format!("attachment; filename=\"{escaped}\"")
    }
}
