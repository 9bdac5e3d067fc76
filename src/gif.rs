//! Animated GIF encoding for the frame pipeline.
//!
//! Frames are quantised to a 256-colour palette each by the `gif` crate's
//! NeuQuant quantiser; [`GifOptions::quality`] picks the sampling speed.
//! With [`GifOptions::optimize`] every frame after the first only carries the
//! rectangle that differs from its predecessor and is drawn over it with
//! [`DisposalMethod::Keep`].

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use gif::{DisposalMethod, Encoder, Frame, Repeat};
use image::{
    DynamicImage, RgbaImage,
    imageops::{self, FilterType},
};

use crate::configuration::GifOptions;
use crate::error::ConvertError;
use crate::progress::ProgressTracker;

/// A rectangle inside the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Region {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    fn full(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            width,
            height,
        }
    }

    fn covers(&self, width: u32, height: u32) -> bool {
        self.left == 0 && self.top == 0 && self.width == width && self.height == height
    }
}

/// Bounding box of the pixels that differ between two equally sized frames.
///
/// `None` when the frames are identical.
pub(crate) fn changed_region(previous: &RgbaImage, current: &RgbaImage) -> Option<Region> {
    if previous.dimensions() != current.dimensions() {
        let (width, height) = current.dimensions();
        return Some(Region::full(width, height));
    }

    let (width, height) = current.dimensions();
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;

    for (x, y, pixel) in current.enumerate_pixels() {
        if previous.get_pixel(x, y) != pixel {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    if min_x > max_x || min_y > max_y || min_x >= width || min_y >= height {
        return None;
    }

    Some(Region {
        left: min_x,
        top: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

fn gif_dimension(value: u32, axis: &str) -> Result<u16, ConvertError> {
    if value == 0 {
        return Err(ConvertError::EncodeFailure(format!(
            "frame {axis} is zero after downscaling"
        )));
    }
    u16::try_from(value).map_err(|_| {
        ConvertError::EncodeFailure(format!("frame {axis} {value} exceeds the GIF limit of 65535"))
    })
}

/// Encode `frames` as an animated GIF at `path`.
///
/// The canvas takes the first frame's size; later frames of a different size
/// are stretched onto it. Returns the canvas size.
pub(crate) fn encode_gif(
    path: &Path,
    frames: &[DynamicImage],
    options: &GifOptions,
    tracker: &mut ProgressTracker,
) -> Result<(u32, u32), ConvertError> {
    let first = frames
        .first()
        .ok_or_else(|| ConvertError::EncodeFailure("no frames to encode".to_string()))?;
    let (width, height) = (first.width(), first.height());
    let canvas_width = gif_dimension(width, "width")?;
    let canvas_height = gif_dimension(height, "height")?;

    log::debug!(
        "Encoding {} frames ({}x{}) to GIF file {} (quality={}, optimize={})",
        frames.len(),
        width,
        height,
        path.display(),
        options.quality,
        options.optimize,
    );

    let file = File::create(path)
        .map_err(|e| ConvertError::EncodeFailure(format!("Failed to create GIF file: {e}")))?;
    let mut encoder = Encoder::new(BufWriter::new(file), canvas_width, canvas_height, &[])?;

    let repeat = match options.repeat {
        None => Repeat::Infinite,
        Some(count) => Repeat::Finite(count),
    };
    encoder.set_repeat(repeat)?;

    let speed = options.quantizer_speed();
    let mut previous: Option<RgbaImage> = None;

    for image in frames {
        let mut rgba = image.to_rgba8();
        if rgba.dimensions() != (width, height) {
            log::debug!(
                "Stretching {}x{} frame onto {}x{} canvas",
                rgba.width(),
                rgba.height(),
                width,
                height
            );
            rgba = imageops::resize(&rgba, width, height, FilterType::Triangle);
        }

        let region = match previous.as_ref() {
            Some(previous) if options.optimize => {
                changed_region(previous, &rgba).unwrap_or(Region {
                    left: 0,
                    top: 0,
                    width: 1,
                    height: 1,
                })
            }
            _ => Region::full(width, height),
        };

        let mut pixels = if region.covers(width, height) {
            rgba.as_raw().clone()
        } else {
            imageops::crop_imm(&rgba, region.left, region.top, region.width, region.height)
                .to_image()
                .into_raw()
        };

        let mut gif_frame =
            Frame::from_rgba_speed(region.width as u16, region.height as u16, &mut pixels, speed);
        gif_frame.left = region.left as u16;
        gif_frame.top = region.top as u16;
        gif_frame.delay = options.frame_delay;
        gif_frame.dispose = DisposalMethod::Keep;

        encoder.write_frame(&gif_frame)?;
        tracker.advance();
        previous = Some(rgba);
    }

    encoder
        .into_inner()
        .and_then(|mut writer| writer.flush())
        .map_err(|e| ConvertError::EncodeFailure(format!("Failed to finish GIF file: {e}")))?;
    tracker.finish();

    Ok((width, height))
}
