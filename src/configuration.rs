//! Conversion configuration.
//!
//! Option structs are passed into the workflow and engines at construction
//! instead of living in process-wide state:
//!
//! - [`WorkspaceConfig`]: where uploads and artifacts live and how the
//!   output artifact is named.
//! - [`GifOptions`]: downscale factor, quality, optimisation and looping for
//!   the frame pipeline.
//! - [`TranscodeOptions`]: the external `ffmpeg` invocation used by the
//!   delegated strategy.
//!
//! # Example
//!
//! ```no_run
//! use gifnetor::{GifOptions, OutputNaming, WorkspaceConfig};
//!
//! let workspace = WorkspaceConfig::new("uploads")
//!     .with_output_naming(OutputNaming::Fixed);
//! let gif = GifOptions::new()
//!     .with_quality(70)
//!     .with_downscale_factor(2);
//! ```

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::util::log::Level;

/// Default name of the output artifact and of the file offered for download.
pub const DEFAULT_OUTPUT_FILE_NAME: &str = "output.gif";

/// MIME type of every delivered artifact.
pub const GIF_MIME_TYPE: &str = "image/gif";

/// How the output artifact inside the workspace is named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputNaming {
    /// One file per request, named after the request id. This is the default.
    #[default]
    PerRequest,
    /// A single shared slot named [`WorkspaceConfig::output_file_name`].
    ///
    /// Concurrent requests sharing a workspace overwrite each other's
    /// result.
    Fixed,
}

/// Location and naming of the scratch workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    /// Directory holding uploads and output artifacts. Created lazily.
    pub directory: PathBuf,
    /// Name used for the fixed output slot and for downloads.
    pub output_file_name: String,
    /// How output artifacts are named on disk.
    pub output_naming: OutputNaming,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self::new("uploads")
    }
}

impl WorkspaceConfig {
    /// Create a configuration rooted at `directory` with default naming.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            output_file_name: DEFAULT_OUTPUT_FILE_NAME.to_string(),
            output_naming: OutputNaming::default(),
        }
    }

    /// Set the output / download file name.
    #[must_use]
    pub fn with_output_file_name(mut self, name: impl Into<String>) -> Self {
        self.output_file_name = name.into();
        self
    }

    /// Choose between per-request and fixed output naming.
    #[must_use]
    pub fn with_output_naming(mut self, naming: OutputNaming) -> Self {
        self.output_naming = naming;
        self
    }
}

/// Configuration for the frame-pipeline GIF output.
#[derive(Debug, Clone)]
pub struct GifOptions {
    /// Every frame is shrunk to `(width / factor, height / factor)`.
    pub downscale_factor: u32,
    /// Lossy quality, 1 (smallest) to 100 (best). Default 50.
    pub quality: u8,
    /// Encode only the region that changed since the previous frame.
    pub optimize: bool,
    /// How many times the GIF should repeat. `None` means loop forever.
    pub repeat: Option<u16>,
    /// Delay between frames in hundredths of a second.
    pub frame_delay: u16,
}

impl Default for GifOptions {
    fn default() -> Self {
        Self {
            downscale_factor: 4,
            quality: 50,
            optimize: true,
            repeat: None,
            frame_delay: 0,
        }
    }
}

impl GifOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the downscale factor. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_downscale_factor(mut self, factor: u32) -> Self {
        self.downscale_factor = factor.max(1);
        self
    }

    /// Set the lossy quality. Clamped to `1..=100`.
    #[must_use]
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// Enable or disable changed-region optimisation.
    #[must_use]
    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Set the repeat count. `None` means loop forever.
    #[must_use]
    pub fn with_repeat(mut self, repeat: Option<u16>) -> Self {
        self.repeat = repeat;
        self
    }

    /// Set the delay between frames in hundredths of a second.
    #[must_use]
    pub fn with_frame_delay(mut self, delay: u16) -> Self {
        self.frame_delay = delay;
        self
    }

    /// Size of a frame after downscaling.
    ///
    /// Integer division, so `(1921, 1081)` becomes `(480, 270)` at factor 4.
    pub fn downscaled_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let factor = self.downscale_factor.max(1);
        (width / factor, height / factor)
    }

    /// NeuQuant sampling speed for the `gif` quantiser.
    ///
    /// Quality 100 maps to speed 1 (slowest, best palette), quality 1 to 30.
    pub(crate) fn quantizer_speed(&self) -> i32 {
        let quality = i32::from(self.quality.clamp(1, 100));
        (30 - (quality - 1) * 29 / 99).clamp(1, 30)
    }
}

/// Configuration for the delegated `ffmpeg` process.
#[derive(Debug, Clone)]
pub struct TranscodeOptions {
    /// Program to run. Defaults to `ffmpeg` resolved through `PATH`.
    pub program: PathBuf,
    /// Output frame rate. `None` keeps the source rate.
    pub fps: Option<u32>,
    /// Output width; height follows the aspect ratio. `None` keeps the source.
    pub width: Option<u32>,
    /// Maximum length of the converted clip.
    pub max_duration: Option<Duration>,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            fps: Some(10),
            width: Some(320),
            max_duration: Some(Duration::from_secs(10)),
        }
    }
}

impl TranscodeOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different program instead of `ffmpeg`.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Set the output frame rate.
    #[must_use]
    pub fn with_fps(mut self, fps: Option<u32>) -> Self {
        self.fps = fps.filter(|&value| value > 0);
        self
    }

    /// Set the output width.
    #[must_use]
    pub fn with_width(mut self, width: Option<u32>) -> Self {
        self.width = width.filter(|&value| value > 0);
        self
    }

    /// Limit the converted clip length.
    #[must_use]
    pub fn with_max_duration(mut self, duration: Option<Duration>) -> Self {
        self.max_duration = duration;
        self
    }

    /// The `-vf` filter chain, if any filter is configured.
    pub fn video_filter(&self) -> Option<String> {
        let mut filters = Vec::new();
        if let Some(fps) = self.fps {
            filters.push(format!("fps={fps}"));
        }
        if let Some(width) = self.width {
            filters.push(format!("scale={width}:-1:flags=lanczos"));
        }
        if filters.is_empty() {
            None
        } else {
            Some(filters.join(","))
        }
    }

    /// Full argument list passed to the program.
    pub fn arguments(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut arguments: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
            .into_iter()
            .map(OsString::from)
            .collect();
        arguments.push(input.as_os_str().to_os_string());
        if let Some(filter) = self.video_filter() {
            arguments.push("-vf".into());
            arguments.push(filter.into());
        }
        if let Some(duration) = self.max_duration {
            arguments.push("-t".into());
            arguments.push(format_seconds(duration).into());
        }
        arguments.push(output.as_os_str().to_os_string());
        arguments
    }
}

fn format_seconds(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        duration.as_secs().to_string()
    } else {
        format!("{:.3}", duration.as_secs_f64())
    }
}

/// FFmpeg's own console verbosity, used by the frame decoder.
///
/// This does not affect messages emitted through the `log` crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderLogLevel {
    Quiet,
    Fatal,
    Error,
    Warning,
    Info,
    Debug,
}

impl DecoderLogLevel {
    fn to_ffmpeg_level(self) -> Level {
        match self {
            DecoderLogLevel::Quiet => Level::Quiet,
            DecoderLogLevel::Fatal => Level::Fatal,
            DecoderLogLevel::Error => Level::Error,
            DecoderLogLevel::Warning => Level::Warning,
            DecoderLogLevel::Info => Level::Info,
            DecoderLogLevel::Debug => Level::Debug,
        }
    }
}

/// Set FFmpeg's console verbosity for subsequent decodes.
pub fn set_decoder_log_level(level: DecoderLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}
