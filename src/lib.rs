//! # gifnetor
//!
//! Turn uploaded video clips into looping animated GIFs.
//!
//! `gifnetor` wraps one request's lifecycle (store the upload, convert it,
//! hand the GIF back, delete the files) in [`ConversionWorkflow`]. The
//! conversion itself is pluggable through [`TransformEngine`]:
//!
//! - [`FramePipeline`] decodes every frame with FFmpeg via
//!   [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next), shrinks it by a
//!   fixed factor, and encodes the GIF with the
//!   [`gif`](https://crates.io/crates/gif) crate.
//! - [`FfmpegTranscoder`] hands the whole job to an external `ffmpeg`
//!   process.
//!
//! ## Quick Start
//!
//! ```no_run
//! use gifnetor::{
//!     ConversionWorkflow, ConvertError, FramePipeline, GifOptions, Upload, UploadPolicy,
//!     WorkspaceConfig,
//! };
//!
//! let upload = UploadPolicy::new().accept(Some(Upload::from_path("clip.mp4")?))?;
//!
//! let mut workflow = ConversionWorkflow::new(
//!     WorkspaceConfig::new("uploads"),
//!     FramePipeline::ffmpeg(GifOptions::new()),
//! );
//! workflow.intake(Some(upload))?;
//!
//! let result = workflow.convert()?;
//! println!("{:?} frames", result.frame_count);
//!
//! let gif = workflow.deliver()?;
//! std::fs::write(&gif.file_name, &gif.bytes).ok();
//!
//! workflow.cleanup()?;
//! # Ok::<(), ConvertError>(())
//! ```
//!
//! ## Delegating to `ffmpeg`
//!
//! ```no_run
//! use gifnetor::{ConversionWorkflow, FfmpegTranscoder, TranscodeOptions, WorkspaceConfig};
//!
//! let workflow = ConversionWorkflow::new(
//!     WorkspaceConfig::new("uploads"),
//!     FfmpegTranscoder::new(TranscodeOptions::new()),
//! );
//! ```
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed to build the crate. The
//! delegated strategy additionally needs an `ffmpeg` executable at run time.

pub mod configuration;
pub mod decoder;
pub mod delivery;
pub mod engine;
pub mod error;
mod gif;
pub mod pipeline;
pub mod progress;
pub mod request;
pub mod transcode;
pub mod upload;
pub mod workflow;
pub mod workspace;

pub use configuration::{
    DEFAULT_OUTPUT_FILE_NAME, DecoderLogLevel, GIF_MIME_TYPE, GifOptions, OutputNaming,
    TranscodeOptions, WorkspaceConfig, set_decoder_log_level,
};
pub use decoder::{FfmpegSource, FfmpegStream};
pub use delivery::Delivery;
pub use engine::{TransformEngine, TransformOutput};
pub use error::{ConvertError, FailureKind};
pub use pipeline::{FramePipeline, FrameSource, FrameStream};
pub use progress::{OperationType, ProgressCallback, ProgressInfo};
pub use request::{ConversionRequest, ConversionResult, RequestId};
pub use transcode::{FfmpegTranscoder, PendingTranscode};
pub use upload::{DEFAULT_ALLOWED_EXTENSIONS, Upload, UploadPolicy};
pub use workflow::{CleanupOutcome, ConversionWorkflow, WorkflowState};
pub use workspace::Workspace;
