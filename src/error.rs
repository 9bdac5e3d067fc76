//! Error types for the `gifnetor` crate.
//!
//! This module defines [`ConvertError`], the unified error type returned by
//! every fallible operation in the crate, and [`FailureKind`], the plain tag
//! recorded by the workflow when a conversion fails. Errors carry the path or
//! upstream message needed to diagnose the problem.

use std::{fmt, io::Error as IoError, path::PathBuf};

use gif::EncodingError;
use thiserror::Error;

use crate::workflow::WorkflowState;

/// The unified error type for all `gifnetor` operations.
///
/// None of these are fatal to the hosting process: every operation that
/// fails may be retried by the caller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConvertError {
    /// The caller submitted no file, or a file without a usable name.
    #[error("No file was provided")]
    NoFileProvided,

    /// The upload's extension is not in the allowed set.
    #[error("Unsupported file type for {name} (allowed: {allowed})")]
    UnsupportedExtension {
        /// File name as submitted.
        name: String,
        /// Comma-separated list of accepted extensions.
        allowed: String,
    },

    /// The upload exceeds the configured size limit.
    #[error("Upload is {size} bytes, limit is {limit} bytes")]
    PayloadTooLarge {
        /// Size of the submitted payload.
        size: u64,
        /// Configured maximum.
        limit: u64,
    },

    /// Writing, reading, or removing a workspace file failed.
    #[error("Storage failure at {path}: {source}")]
    StorageFailure {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: IoError,
    },

    /// The input could not be opened as a decodable video.
    #[error("Failed to open media file at {path}: {reason}")]
    UnopenableMedia {
        /// Input path.
        path: PathBuf,
        /// Why the open failed.
        reason: String,
    },

    /// The input opened but yielded no frames.
    #[error("Media file at {path} contains no frames")]
    EmptyMedia {
        /// Input path.
        path: PathBuf,
    },

    /// The input opened but a frame could not be decoded or converted.
    #[error("Failed to decode frame from {path}: {reason}")]
    DecodeFailure {
        /// Input path.
        path: PathBuf,
        /// Why decoding stopped.
        reason: String,
    },

    /// Writing the animated output failed.
    #[error("GIF encoding error: {0}")]
    EncodeFailure(String),

    /// The external transcoding process reported an error.
    #[error("Transcode engine error: {0}")]
    EngineFailure(String),

    /// The requested operation is not valid in the workflow's current state.
    #[error("Cannot {operation} while the workflow is {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the workflow was in.
        state: WorkflowState,
    },

    /// Delivery was requested but no converted artifact exists.
    #[error("No converted artifact is available (workflow is {state})")]
    NothingToDeliver {
        /// State the workflow was in.
        state: WorkflowState,
    },
}

impl ConvertError {
    /// The plain tag for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            ConvertError::NoFileProvided => FailureKind::NoFileProvided,
            ConvertError::UnsupportedExtension { .. } => FailureKind::UnsupportedExtension,
            ConvertError::PayloadTooLarge { .. } => FailureKind::PayloadTooLarge,
            ConvertError::StorageFailure { .. } => FailureKind::StorageFailure,
            ConvertError::UnopenableMedia { .. } => FailureKind::UnopenableMedia,
            ConvertError::EmptyMedia { .. } => FailureKind::EmptyMedia,
            ConvertError::DecodeFailure { .. } => FailureKind::DecodeFailure,
            ConvertError::EncodeFailure(_) => FailureKind::EncodeFailure,
            ConvertError::EngineFailure(_) => FailureKind::EngineFailure,
            ConvertError::InvalidState { .. } => FailureKind::InvalidState,
            ConvertError::NothingToDeliver { .. } => FailureKind::NothingToDeliver,
        }
    }

    /// Short message suitable for showing to the person who uploaded the file.
    ///
    /// Unlike the [`Display`](std::fmt::Display) output this never includes
    /// server-side paths.
    pub fn user_message(&self) -> String {
        match self {
            ConvertError::NoFileProvided => "Please choose a video file to upload.".to_string(),
            ConvertError::UnsupportedExtension { allowed, .. } => {
                format!("That file type is not supported. Allowed types: {allowed}.")
            }
            ConvertError::PayloadTooLarge { limit, .. } => {
                format!("The file is too large. The limit is {limit} bytes.")
            }
            ConvertError::StorageFailure { .. } => {
                "The file could not be saved on the server.".to_string()
            }
            ConvertError::UnopenableMedia { .. } => {
                "An error occurred while opening the file.".to_string()
            }
            ConvertError::EmptyMedia { .. } => "The video contains no frames.".to_string(),
            ConvertError::DecodeFailure { .. } => {
                "The video could not be decoded completely.".to_string()
            }
            ConvertError::EncodeFailure(_) => "The GIF could not be written.".to_string(),
            ConvertError::EngineFailure(_) => "Failed to convert video to GIF.".to_string(),
            ConvertError::InvalidState { operation, state } => {
                format!("Cannot {operation} right now ({state}).")
            }
            ConvertError::NothingToDeliver { .. } => "There is no GIF to show yet.".to_string(),
        }
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, source: IoError) -> Self {
        ConvertError::StorageFailure {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unopenable(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        ConvertError::UnopenableMedia {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<EncodingError> for ConvertError {
    fn from(error: EncodingError) -> Self {
        ConvertError::EncodeFailure(error.to_string())
    }
}

/// Tag identifying which kind of failure occurred.
///
/// Recorded in [`WorkflowState::Failed`] so the reason survives after the
/// error value itself has been handed to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FailureKind {
    NoFileProvided,
    UnsupportedExtension,
    PayloadTooLarge,
    StorageFailure,
    UnopenableMedia,
    EmptyMedia,
    DecodeFailure,
    EncodeFailure,
    EngineFailure,
    InvalidState,
    NothingToDeliver,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureKind::NoFileProvided => "no file provided",
            FailureKind::UnsupportedExtension => "unsupported extension",
            FailureKind::PayloadTooLarge => "payload too large",
            FailureKind::StorageFailure => "storage failure",
            FailureKind::UnopenableMedia => "unopenable media",
            FailureKind::EmptyMedia => "empty media",
            FailureKind::DecodeFailure => "decode failure",
            FailureKind::EncodeFailure => "encode failure",
            FailureKind::EngineFailure => "engine failure",
            FailureKind::InvalidState => "invalid state",
            FailureKind::NothingToDeliver => "nothing to deliver",
        };
        f.write_str(text)
    }
}
