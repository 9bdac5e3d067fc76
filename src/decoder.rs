//! FFmpeg-backed [`FrameSource`].
//!
//! [`FfmpegStream`] decodes the best video stream of a container one frame
//! at a time, converting each frame to packed RGB24 before handing it out as
//! an [`image::DynamicImage`].

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

use ffmpeg_next::{
    Error as FfmpegError, Packet,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, RgbImage};

use crate::configuration::{DecoderLogLevel, set_decoder_log_level};
use crate::error::ConvertError;
use crate::pipeline::{FrameSource, FrameStream};

/// Packet read failures tolerated in a row before the stream is treated as
/// ended.
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 32;

/// Opens inputs with FFmpeg.
#[derive(Debug, Clone, Default)]
pub struct FfmpegSource {
    log_level: Option<DecoderLogLevel>,
}

impl FfmpegSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set FFmpeg's console verbosity whenever an input is opened.
    #[must_use]
    pub fn with_log_level(mut self, level: DecoderLogLevel) -> Self {
        self.log_level = Some(level);
        self
    }
}

impl FrameSource for FfmpegSource {
    type Stream = FfmpegStream;

    fn open(&mut self, path: &Path) -> Result<FfmpegStream, ConvertError> {
        log::debug!("Opening media file: {}", path.display());

        ffmpeg_next::init().map_err(|error| {
            ConvertError::unopenable(path, format!("FFmpeg initialisation failed: {error}"))
        })?;
        if let Some(level) = self.log_level {
            set_decoder_log_level(level);
        }

        let input = ffmpeg_next::format::input(&path)
            .map_err(|error| ConvertError::unopenable(path, error))?;

        let (stream_index, frame_count_hint, decoder) = {
            let stream = input
                .streams()
                .best(Type::Video)
                .ok_or_else(|| ConvertError::unopenable(path, "no video stream found"))?;
            let frames = stream.frames();
            let hint = if frames > 0 { Some(frames as u64) } else { None };

            let decoder_context = CodecContext::from_parameters(stream.parameters())
                .map_err(|error| {
                    ConvertError::unopenable(path, format!("bad codec parameters: {error}"))
                })?;
            let decoder = decoder_context.decoder().video().map_err(|error| {
                ConvertError::unopenable(path, format!("no usable video decoder: {error}"))
            })?;
            (stream.index(), hint, decoder)
        };

        Ok(FfmpegStream {
            path: path.to_path_buf(),
            input,
            decoder,
            stream_index,
            frame_count_hint,
            converter: RgbConverter::new(),
            decoded_frame: VideoFrame::empty(),
            consecutive_read_errors: 0,
            eof_sent: false,
            done: false,
        })
    }
}

/// Pull-based decoder over one input's best video stream.
pub struct FfmpegStream {
    path: PathBuf,
    input: Input,
    decoder: VideoDecoder,
    stream_index: usize,
    frame_count_hint: Option<u64>,
    converter: RgbConverter,
    decoded_frame: VideoFrame,
    consecutive_read_errors: u32,
    eof_sent: bool,
    done: bool,
}

impl Debug for FfmpegStream {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FfmpegStream")
            .field("path", &self.path)
            .field("stream_index", &self.stream_index)
            .field("frame_count_hint", &self.frame_count_hint)
            .field("eof_sent", &self.eof_sent)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl FfmpegStream {
    fn convert_current_frame(&mut self) -> Result<DynamicImage, ConvertError> {
        self.converter
            .convert(&self.decoded_frame)
            .map(DynamicImage::ImageRgb8)
            .map_err(|reason| ConvertError::DecodeFailure {
                path: self.path.clone(),
                reason,
            })
    }
}

/// Converts decoded frames of any pixel format to packed RGB24.
///
/// The scaler is built from the first frame and rebuilt whenever the frame
/// geometry or format changes mid-stream.
struct RgbConverter {
    scaler: Option<ScalingContext>,
    rgb_frame: VideoFrame,
}

impl RgbConverter {
    fn new() -> Self {
        Self {
            scaler: None,
            rgb_frame: VideoFrame::empty(),
        }
    }

    fn convert(&mut self, frame: &VideoFrame) -> Result<RgbImage, String> {
        let width = frame.width();
        let height = frame.height();
        let format = frame.format();

        let stale = self.scaler.as_ref().is_none_or(|scaler| {
            let definition = scaler.input();
            definition.width != width || definition.height != height || definition.format != format
        });
        if stale {
            if self.scaler.is_some() {
                log::debug!("Frame geometry changed to {width}x{height} ({format:?})");
            }
            let scaler = ScalingContext::get(
                format,
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                ScalingFlags::BILINEAR,
            )
            .map_err(|error| format!("cannot convert frames: {error}"))?;
            self.scaler = Some(scaler);
            // The scaler only allocates an empty output frame.
            self.rgb_frame = VideoFrame::empty();
        }

        if let Some(scaler) = self.scaler.as_mut() {
            scaler
                .run(frame, &mut self.rgb_frame)
                .map_err(|error| format!("cannot convert frame: {error}"))?;
        }

        let buffer = frame_to_buffer(&self.rgb_frame, width, height, 3);
        RgbImage::from_raw(width, height, buffer)
            .ok_or_else(|| "decoded frame data does not match its dimensions".to_string())
    }
}

impl FrameStream for FfmpegStream {
    fn next_frame(&mut self) -> Result<Option<DynamicImage>, ConvertError> {
        loop {
            if self.done {
                return Ok(None);
            }

            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                return self.convert_current_frame().map(Some);
            }

            // Decoder has nothing buffered.
            if self.eof_sent {
                self.done = true;
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    self.consecutive_read_errors = 0;
                    if packet.stream() == self.stream_index {
                        if let Err(error) = self.decoder.send_packet(&packet) {
                            log::warn!(
                                "Skipping undecodable packet in {}: {error}",
                                self.path.display()
                            );
                        }
                    }
                }
                Err(FfmpegError::Eof) => self.finish_input(),
                Err(error) => {
                    self.consecutive_read_errors += 1;
                    if self.consecutive_read_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                        log::warn!(
                            "Giving up on {} after repeated read errors: {error}",
                            self.path.display()
                        );
                        self.finish_input();
                    }
                }
            }
        }
    }

    fn frame_count_hint(&self) -> Option<u64> {
        self.frame_count_hint
    }
}

impl FfmpegStream {
    fn finish_input(&mut self) {
        if let Err(error) = self.decoder.send_eof() {
            log::debug!("Decoder rejected end of stream: {error}");
        }
        self.eof_sent = true;
    }
}

/// Copy plane 0 of `video_frame` into a tightly packed buffer.
fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_length = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == row_length {
        data[..row_length * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_length * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + row_length]);
        }
        buffer
    }
}
