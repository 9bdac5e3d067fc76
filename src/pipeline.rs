//! Frame-by-frame conversion strategy.
//!
//! [`FramePipeline`] opens the input through a [`FrameSource`], pulls frames
//! until the stream ends, downscales each one by
//! [`GifOptions::downscale_factor`], and encodes the sequence as a looping
//! GIF.
//!
//! The default source is [`FfmpegSource`](crate::FfmpegSource). Any other
//! decoder can be plugged in by implementing [`FrameSource`].
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use gifnetor::{ConvertError, FramePipeline, GifOptions, TransformEngine};
//!
//! let mut pipeline = FramePipeline::ffmpeg(GifOptions::new());
//! let output = pipeline.transform(Path::new("clip.mp4"), Path::new("clip.gif"))?;
//! println!("{:?} frames", output.frame_count);
//! # Ok::<(), ConvertError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use image::{DynamicImage, imageops::FilterType};

use crate::configuration::GifOptions;
use crate::decoder::FfmpegSource;
use crate::engine::{TransformEngine, TransformOutput};
use crate::error::ConvertError;
use crate::gif::encode_gif;
use crate::progress::{NoOpProgress, OperationType, ProgressCallback, ProgressTracker};

/// Opens inputs as streams of decoded frames.
pub trait FrameSource {
    type Stream: FrameStream;

    /// # Errors
    ///
    /// [`ConvertError::UnopenableMedia`] when `path` is not decodable.
    fn open(&mut self, path: &Path) -> Result<Self::Stream, ConvertError>;
}

/// A decodable stream of frames in display colour.
pub trait FrameStream {
    /// The next frame, or `Ok(None)` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<DynamicImage>, ConvertError>;

    /// Number of frames the container claims to hold, if known.
    fn frame_count_hint(&self) -> Option<u64> {
        None
    }
}

/// Decode, downscale, and re-encode strategy.
pub struct FramePipeline<S = FfmpegSource> {
    source: S,
    options: GifOptions,
    progress: Arc<dyn ProgressCallback>,
    batch_size: u64,
}

impl<S> Debug for FramePipeline<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FramePipeline")
            .field("options", &self.options)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl FramePipeline<FfmpegSource> {
    /// Pipeline decoding through FFmpeg.
    pub fn ffmpeg(options: GifOptions) -> Self {
        Self::new(FfmpegSource::new(), options)
    }
}

impl<S: FrameSource> FramePipeline<S> {
    pub fn new(source: S, options: GifOptions) -> Self {
        Self {
            source,
            options,
            progress: Arc::new(NoOpProgress),
            batch_size: 1,
        }
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Report progress every `size` frames. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn options(&self) -> &GifOptions {
        &self.options
    }

    /// Pull every frame from `path`, downscaled.
    ///
    /// # Errors
    ///
    /// [`ConvertError::UnopenableMedia`] when the source cannot open the
    /// input, [`ConvertError::EmptyMedia`] when it opens but yields nothing.
    pub fn collect_frames(&mut self, path: &Path) -> Result<Vec<DynamicImage>, ConvertError> {
        let mut stream = self.source.open(path)?;
        let mut tracker = ProgressTracker::new(
            Arc::clone(&self.progress),
            OperationType::FrameDecoding,
            stream.frame_count_hint(),
            self.batch_size,
        );

        let mut frames = Vec::new();
        while let Some(frame) = stream.next_frame()? {
            frames.push(self.downscale(frame));
            tracker.advance();
        }
        tracker.finish();

        if frames.is_empty() {
            return Err(ConvertError::EmptyMedia {
                path: path.to_path_buf(),
            });
        }

        log::debug!("Decoded {} frames from {}", frames.len(), path.display());
        Ok(frames)
    }

    fn downscale(&self, frame: DynamicImage) -> DynamicImage {
        let (width, height) = self
            .options
            .downscaled_dimensions(frame.width(), frame.height());
        if (width, height) == (frame.width(), frame.height()) {
            return frame;
        }
        if width == 0 || height == 0 {
            // Left for the encoder to reject with a precise message.
            return DynamicImage::new_rgb8(width, height);
        }
        frame.resize_exact(width, height, FilterType::Triangle)
    }
}

impl<S: FrameSource> TransformEngine for FramePipeline<S> {
    fn name(&self) -> &'static str {
        "frame-pipeline"
    }

    fn transform(&mut self, input: &Path, output: &Path) -> Result<TransformOutput, ConvertError> {
        let frames = self.collect_frames(input)?;
        let frame_count = frames.len() as u64;

        let mut tracker = ProgressTracker::new(
            Arc::clone(&self.progress),
            OperationType::GifEncoding,
            Some(frame_count),
            self.batch_size,
        );

        match encode_gif(output, &frames, &self.options, &mut tracker) {
            Ok(frame_size) => Ok(TransformOutput {
                output_path: output.to_path_buf(),
                frame_count: Some(frame_count),
                frame_size: Some(frame_size),
            }),
            Err(error) => {
                if let Err(cleanup_error) = fs::remove_file(output) {
                    if cleanup_error.kind() != ErrorKind::NotFound {
                        log::debug!(
                            "Could not remove partial GIF {}: {cleanup_error}",
                            output.display()
                        );
                    }
                }
                Err(error)
            }
        }
    }
}
