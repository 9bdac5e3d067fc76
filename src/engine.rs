//! The transform seam between the workflow and a conversion strategy.
//!
//! Two strategies implement [`TransformEngine`]:
//!
//! - [`FramePipeline`](crate::FramePipeline) decodes every frame, downscales
//!   it, and encodes the GIF itself. It knows how many frames it processed.
//! - [`FfmpegTranscoder`](crate::FfmpegTranscoder) hands the whole job to an
//!   external `ffmpeg` process. It reports only the output path.

use std::path::{Path, PathBuf};

use crate::error::ConvertError;

/// What an engine produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub output_path: PathBuf,
    /// Frames processed, when the engine can tell.
    pub frame_count: Option<u64>,
    /// Size of the encoded frames, when the engine can tell.
    pub frame_size: Option<(u32, u32)>,
}

impl TransformOutput {
    /// An output without frame information.
    pub fn opaque(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            frame_count: None,
            frame_size: None,
        }
    }
}

/// Converts an input video into an animated image at `output`.
///
/// Calls block until the output is complete or the conversion has failed.
/// Implementations must not leave a partial file at `output` when they fail.
pub trait TransformEngine {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn transform(&mut self, input: &Path, output: &Path) -> Result<TransformOutput, ConvertError>;
}

impl<E: TransformEngine + ?Sized> TransformEngine for Box<E> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn transform(&mut self, input: &Path, output: &Path) -> Result<TransformOutput, ConvertError> {
        (**self).transform(input, output)
    }
}
