//! Delegated conversion through an external `ffmpeg` process.
//!
//! [`FfmpegTranscoder::transcode`] runs the process and waits for it to
//! exit. When the caller wants to do something else meanwhile,
//! [`FfmpegTranscoder::spawn`] starts it and returns a [`PendingTranscode`]
//! that must be completed with [`wait`](PendingTranscode::wait) or polled
//! with [`try_wait`](PendingTranscode::try_wait).
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use gifnetor::{ConvertError, FfmpegTranscoder, TranscodeOptions};
//!
//! let transcoder = FfmpegTranscoder::new(TranscodeOptions::new().with_width(Some(480)));
//! let pending = transcoder.spawn(Path::new("clip.mp4"), Path::new("clip.gif"))?;
//! // ... other work ...
//! let output = pending.wait()?;
//! assert!(output.frame_count.is_none());
//! # Ok::<(), ConvertError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::fs;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::configuration::TranscodeOptions;
use crate::engine::{TransformEngine, TransformOutput};
use crate::error::ConvertError;
use crate::progress::{NoOpProgress, OperationType, ProgressCallback, ProgressTracker};

/// Trailing stderr characters kept in error messages.
const STDERR_TAIL: usize = 512;

/// Raw stderr bytes retained while the process runs.
const STDERR_BUFFER: usize = 4 * STDERR_TAIL;

/// Runs `ffmpeg` (or a configured replacement) as a child process.
#[derive(Clone)]
pub struct FfmpegTranscoder {
    options: TranscodeOptions,
    progress: Arc<dyn ProgressCallback>,
}

impl Debug for FfmpegTranscoder {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FfmpegTranscoder")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new(TranscodeOptions::default())
    }
}

impl FfmpegTranscoder {
    pub fn new(options: TranscodeOptions) -> Self {
        Self {
            options,
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Attach a progress callback.
    ///
    /// The process reports nothing while it runs; the callback receives a
    /// single [`OperationType::Transcoding`] update after a successful
    /// [`transcode`](Self::transcode).
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    pub fn options(&self) -> &TranscodeOptions {
        &self.options
    }

    /// Convert `input` to `output`, waiting for the process to finish.
    ///
    /// # Errors
    ///
    /// [`ConvertError::UnopenableMedia`] if `input` does not exist;
    /// [`ConvertError::EngineFailure`] if the process cannot be started,
    /// exits unsuccessfully, or exits without writing `output`.
    pub fn transcode(&self, input: &Path, output: &Path) -> Result<TransformOutput, ConvertError> {
        let mut tracker = ProgressTracker::new(
            Arc::clone(&self.progress),
            OperationType::Transcoding,
            Some(1),
            1,
        );
        let transformed = self.spawn(input, output)?.wait()?;
        tracker.advance();
        Ok(transformed)
    }

    /// Start the conversion without waiting for it.
    pub fn spawn(&self, input: &Path, output: &Path) -> Result<PendingTranscode, ConvertError> {
        if !input.is_file() {
            return Err(ConvertError::unopenable(input, "input file does not exist"));
        }

        let arguments = self.options.arguments(input, output);
        log::debug!(
            "Running {} {:?}",
            self.options.program.display(),
            arguments
        );

        let mut child = Command::new(&self.options.program)
            .args(&arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| {
                ConvertError::EngineFailure(format!(
                    "failed to start {}: {error}",
                    self.options.program.display()
                ))
            })?;

        // The pipe must be drained while the process runs or a chatty
        // process blocks on a full pipe and never exits.
        let stderr = child.stderr.take().map(|pipe| {
            thread::Builder::new()
                .name("gifnetor-stderr".to_string())
                .spawn(move || drain_stderr(pipe))
        });
        let stderr = match stderr.transpose() {
            Ok(handle) => handle,
            Err(error) => {
                if let Err(kill_error) = child.kill() {
                    log::debug!("Could not stop transcoder: {kill_error}");
                }
                if let Err(wait_error) = child.wait() {
                    log::debug!("Could not reap transcoder: {wait_error}");
                }
                return Err(ConvertError::EngineFailure(format!(
                    "failed to start stderr reader: {error}"
                )));
            }
        };

        Ok(PendingTranscode {
            child,
            output: output.to_path_buf(),
            stderr,
        })
    }
}

impl TransformEngine for FfmpegTranscoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn transform(&mut self, input: &Path, output: &Path) -> Result<TransformOutput, ConvertError> {
        self.transcode(input, output)
    }
}

/// A running transcode.
///
/// Dropping it without waiting leaves the process running detached.
#[derive(Debug)]
pub struct PendingTranscode {
    child: Child,
    output: PathBuf,
    /// Reader collecting the tail of the process's stderr.
    stderr: Option<JoinHandle<Vec<u8>>>,
}

impl PendingTranscode {
    /// Path the process is writing to.
    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Operating-system process id.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Block until the process exits.
    pub fn wait(mut self) -> Result<TransformOutput, ConvertError> {
        let status = self
            .child
            .wait()
            .map_err(|error| ConvertError::EngineFailure(format!("failed to wait: {error}")))?;
        let stderr = self.collect_stderr();
        complete(&self.output, status, &stderr)
    }

    /// Check whether the process has exited without blocking.
    ///
    /// Returns `Ok(None)` while it is still running.
    pub fn try_wait(&mut self) -> Result<Option<TransformOutput>, ConvertError> {
        let status = self
            .child
            .try_wait()
            .map_err(|error| ConvertError::EngineFailure(format!("failed to poll: {error}")))?;
        let Some(status) = status else {
            return Ok(None);
        };

        let stderr = self.collect_stderr();
        complete(&self.output, status, &stderr).map(Some)
    }

    /// Join the stderr reader once the process has exited.
    fn collect_stderr(&mut self) -> String {
        let Some(reader) = self.stderr.take() else {
            return String::new();
        };
        match reader.join() {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => {
                log::debug!("stderr reader panicked");
                String::new()
            }
        }
    }
}

/// Read `pipe` to the end, keeping only the last [`STDERR_BUFFER`] bytes.
fn drain_stderr(mut pipe: ChildStderr) -> Vec<u8> {
    let mut tail = Vec::with_capacity(STDERR_BUFFER);
    let mut chunk = [0u8; 8192];
    loop {
        match pipe.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => {
                tail.extend_from_slice(&chunk[..read]);
                if tail.len() > STDERR_BUFFER {
                    let excess = tail.len() - STDERR_BUFFER;
                    tail.drain(..excess);
                }
            }
            Err(error) if error.kind() == ErrorKind::Interrupted => {}
            Err(error) => {
                log::debug!("Stopped reading transcoder stderr: {error}");
                break;
            }
        }
    }
    tail
}

fn complete(output: &Path, status: ExitStatus, stderr: &str) -> Result<TransformOutput, ConvertError> {
    if !status.success() {
        if let Err(error) = fs::remove_file(output) {
            if error.kind() != ErrorKind::NotFound {
                log::debug!("Could not remove failed output {}: {error}", output.display());
            }
        }
        let tail = stderr_tail(stderr);
        return Err(ConvertError::EngineFailure(if tail.is_empty() {
            format!("transcoder exited with {status}")
        } else {
            format!("transcoder exited with {status}: {tail}")
        }));
    }

    if !output.is_file() {
        return Err(ConvertError::EngineFailure(format!(
            "transcoder finished but wrote no file at {}",
            output.display()
        )));
    }

    log::debug!("Transcoded to {}", output.display());
    Ok(TransformOutput::opaque(output))
}

fn stderr_tail(stderr: &str) -> &str {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL {
        return trimmed;
    }
    let mut start = trimmed.len() - STDERR_TAIL;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    &trimmed[start..]
}
