//! The upload → convert → deliver → cleanup lifecycle.
//!
//! [`ConversionWorkflow`] drives one request at a time through
//!
//! ```text
//! Idle → Uploaded → Converting → {Converted | Failed} → (optional) Cleaned
//! ```
//!
//! Every step is an explicit call: uploading never starts a conversion and
//! converting never cleans up. A failed step leaves the workflow usable and
//! the caller may retry it.
//!
//! # Example
//!
//! ```no_run
//! use gifnetor::{
//!     CleanupOutcome, ConversionWorkflow, ConvertError, FramePipeline, GifOptions, Upload,
//!     UploadPolicy, WorkspaceConfig,
//! };
//!
//! let policy = UploadPolicy::new();
//! let mut workflow = ConversionWorkflow::new(
//!     WorkspaceConfig::new("uploads"),
//!     FramePipeline::ffmpeg(GifOptions::new()),
//! );
//!
//! let upload = policy.accept(Some(Upload::from_path("clip.mp4")?))?;
//! workflow.intake(Some(upload))?;
//! workflow.convert()?;
//! let delivery = workflow.deliver()?;
//! std::fs::write(&delivery.file_name, &delivery.bytes).ok();
//!
//! assert!(matches!(workflow.cleanup()?, CleanupOutcome::Removed(_)));
//! assert_eq!(workflow.cleanup()?, CleanupOutcome::NothingToRemove);
//! # Ok::<(), ConvertError>(())
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::configuration::{GIF_MIME_TYPE, WorkspaceConfig};
use crate::delivery::Delivery;
use crate::engine::TransformEngine;
use crate::error::{ConvertError, FailureKind};
use crate::request::{ConversionRequest, ConversionResult, RequestId};
use crate::upload::{Upload, media_type_for, stored_file_name};
use crate::workspace::Workspace;

/// Where the workflow is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Uploaded,
    Converting,
    Converted,
    /// The last conversion failed for the given reason.
    Failed(FailureKind),
    Cleaned,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Idle => f.write_str("idle"),
            WorkflowState::Uploaded => f.write_str("uploaded"),
            WorkflowState::Converting => f.write_str("converting"),
            WorkflowState::Converted => f.write_str("converted"),
            WorkflowState::Failed(kind) => write!(f, "failed ({kind})"),
            WorkflowState::Cleaned => f.write_str("cleaned"),
        }
    }
}

/// What a cleanup call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// These files existed and were deleted.
    Removed(Vec<PathBuf>),
    /// No input or output file existed.
    NothingToRemove,
}

impl CleanupOutcome {
    pub fn removed_anything(&self) -> bool {
        matches!(self, CleanupOutcome::Removed(_))
    }
}

/// Drives one conversion request through its lifecycle.
#[derive(Debug)]
pub struct ConversionWorkflow<E> {
    workspace: Workspace,
    engine: E,
    state: WorkflowState,
    request: Option<ConversionRequest>,
    result: Option<ConversionResult>,
    /// Output path of the last conversion attempt, successful or not.
    output_path: Option<PathBuf>,
}

impl<E: TransformEngine> ConversionWorkflow<E> {
    pub fn new(config: WorkspaceConfig, engine: E) -> Self {
        Self {
            workspace: Workspace::new(config),
            engine,
            state: WorkflowState::Idle,
            request: None,
            result: None,
            output_path: None,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// The current request, once an upload has been stored.
    pub fn request(&self) -> Option<&ConversionRequest> {
        self.request.as_ref()
    }

    /// The last successful conversion of the current request.
    pub fn result(&self) -> Option<&ConversionResult> {
        self.result.as_ref()
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Store an upload in the workspace and make it the current request.
    ///
    /// A previous request's files are removed once the new upload is safely
    /// stored.
    ///
    /// # Errors
    ///
    /// [`ConvertError::NoFileProvided`] for a missing or nameless upload,
    /// [`ConvertError::StorageFailure`] if it cannot be written. The
    /// workflow is unchanged on error.
    pub fn intake(&mut self, upload: Option<Upload>) -> Result<&ConversionRequest, ConvertError> {
        if self.state == WorkflowState::Converting {
            return Err(ConvertError::InvalidState {
                operation: "accept an upload",
                state: self.state,
            });
        }

        let upload = upload.ok_or(ConvertError::NoFileProvided)?;
        let file_name = stored_file_name(&upload.name).ok_or(ConvertError::NoFileProvided)?;
        let storage_path = self.workspace.store(&file_name, &upload.bytes)?;

        let request = ConversionRequest {
            id: RequestId::new(),
            media_type: media_type_for(&file_name),
            original_name: file_name,
            storage_path,
        };
        log::info!(
            "Accepted upload {} as request {} ({} bytes)",
            request.original_name,
            request.id,
            upload.bytes.len()
        );

        self.discard_previous(&request.storage_path);
        self.state = WorkflowState::Uploaded;
        Ok(&*self.request.insert(request))
    }

    /// Convert the current upload.
    ///
    /// Allowed after an upload and again after a finished attempt, so a
    /// caller may retry.
    ///
    /// # Errors
    ///
    /// [`ConvertError::InvalidState`] without a current upload; otherwise
    /// whatever the engine reports. On failure no output artifact is left
    /// behind and the state becomes [`WorkflowState::Failed`].
    pub fn convert(&mut self) -> Result<&ConversionResult, ConvertError> {
        let request = match (self.state, self.request.as_ref()) {
            (
                WorkflowState::Uploaded | WorkflowState::Converted | WorkflowState::Failed(_),
                Some(request),
            ) => request,
            (state, _) => {
                return Err(ConvertError::InvalidState {
                    operation: "convert",
                    state,
                });
            }
        };

        let request_id = request.id;
        let input = request.storage_path.clone();
        let output = self.workspace.output_path(&request_id);

        self.state = WorkflowState::Converting;
        self.result = None;
        self.output_path = Some(output.clone());

        log::info!(
            "Converting request {} with {}: {} -> {}",
            request_id,
            self.engine.name(),
            input.display(),
            output.display()
        );

        let outcome = self
            .workspace
            .ensure()
            .and_then(|_| self.engine.transform(&input, &output));

        match outcome {
            Ok(transformed) => {
                log::info!(
                    "Request {} converted ({} frames)",
                    request_id,
                    transformed
                        .frame_count
                        .map_or_else(|| "unknown".to_string(), |count| count.to_string())
                );
                self.state = WorkflowState::Converted;
                Ok(&*self.result.insert(ConversionResult {
                    request_id,
                    output_path: transformed.output_path,
                    frame_count: transformed.frame_count,
                    frame_size: transformed.frame_size,
                }))
            }
            Err(error) => {
                log::info!("Request {request_id} failed: {error}");
                if let Err(cleanup_error) = self.workspace.remove(&output) {
                    log::warn!("Could not remove failed output: {cleanup_error}");
                }
                self.state = WorkflowState::Failed(error.kind());
                Err(error)
            }
        }
    }

    /// Read the converted artifact for display or download.
    ///
    /// # Errors
    ///
    /// [`ConvertError::NothingToDeliver`] unless the last conversion
    /// succeeded; [`ConvertError::StorageFailure`] if the artifact cannot be
    /// read.
    pub fn deliver(&self) -> Result<Delivery, ConvertError> {
        let result = match (self.state, self.result.as_ref()) {
            (WorkflowState::Converted, Some(result)) => result,
            (state, _) => return Err(ConvertError::NothingToDeliver { state }),
        };

        let bytes = fs::read(&result.output_path)
            .map_err(|error| ConvertError::storage(&result.output_path, error))?;

        Ok(Delivery {
            file_name: self.workspace.config().output_file_name.clone(),
            mime_type: GIF_MIME_TYPE,
            path: result.output_path.clone(),
            bytes,
        })
    }

    /// Remove the current request's input and output files.
    ///
    /// Missing files are skipped. Calling this again reports
    /// [`CleanupOutcome::NothingToRemove`].
    ///
    /// # Errors
    ///
    /// [`ConvertError::StorageFailure`] if an existing file cannot be
    /// deleted. The workflow keeps its paths so the call can be repeated.
    pub fn cleanup(&mut self) -> Result<CleanupOutcome, ConvertError> {
        let known = self.known_paths();
        if known.is_empty() {
            return Ok(CleanupOutcome::NothingToRemove);
        }

        let mut removed = Vec::new();
        for path in known {
            if self.workspace.remove(&path)? {
                removed.push(path);
            }
        }

        self.request = None;
        self.result = None;
        self.output_path = None;
        self.state = WorkflowState::Cleaned;

        if removed.is_empty() {
            log::debug!("Cleanup found nothing to remove");
            Ok(CleanupOutcome::NothingToRemove)
        } else {
            log::info!("Removed {} file(s)", removed.len());
            Ok(CleanupOutcome::Removed(removed))
        }
    }

    fn known_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Vec::with_capacity(2);
        let candidates = [
            self.request.as_ref().map(|request| &request.storage_path),
            self.output_path.as_ref(),
        ];
        for path in candidates.into_iter().flatten() {
            if !paths.contains(path) {
                paths.push(path.clone());
            }
        }
        paths
    }

    /// Drop the superseded request, removing its files except `keep`.
    fn discard_previous(&mut self, keep: &Path) {
        for path in self.known_paths() {
            if path == keep {
                continue;
            }
            if let Err(error) = self.workspace.remove(&path) {
                log::warn!("Could not remove superseded file: {error}");
            }
        }
        self.result = None;
        self.output_path = None;
    }
}
