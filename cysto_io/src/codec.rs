//! Image decoding and encoding.
//!
//! Every file is decoded to a 3-channel float [`Image`]. 8/16-bit formats are
//! normalised to `[0, 1]`; OpenEXR keeps its raw float values, which is how
//! depth maps (replicated in each channel) are stored.

use std::path::Path;

use cysto_core::{CoreError, Image};
use image::{DynamicImage, GrayImage, Rgb32FImage, RgbImage};

use crate::error::{CystoIoError, Result};

fn image_err(path: &Path, source: image::ImageError) -> CystoIoError {
    CystoIoError::Image {
        path: path.to_path_buf(),
        source,
    }
}

/// Decode `path` into a CHW RGB float image.
///
/// # Errors
/// Returns [`CystoIoError::Image`] if the file cannot be read or decoded.
pub fn load_image(path: impl AsRef<Path>) -> Result<Image> {
    let path = path.as_ref();
    let decoded = image::open(path).map_err(|e| image_err(path, e))?;
    let rgb = decoded.into_rgb32f();
    let (width, height) = rgb.dimensions();
    Ok(Image::from_hwc(
        3,
        height as usize,
        width as usize,
        rgb.as_raw(),
    )?)
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Encode a 1- or 3-channel image with values in `[0, 1]` as 8-bit.
/// The format follows the file extension.
///
/// # Errors
/// Returns [`CystoIoError::Core`] for other channel counts and
/// [`CystoIoError::Image`] on encoder failure.
pub fn save_image(image: &Image, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let (w, h) = (image.width() as u32, image.height() as u32);
    let raw: Vec<u8> = image.to_hwc().into_iter().map(to_u8).collect();
    let dynamic = match image.channels() {
        1 => GrayImage::from_raw(w, h, raw).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(w, h, raw).map(DynamicImage::ImageRgb8),
        got => {
            return Err(CoreError::ChannelCountMismatch { expected: 3, got }.into());
        }
    };
    let dynamic = dynamic.ok_or(CoreError::BufferSizeMismatch {
        expected: image.channels() * image.height() * image.width(),
        got: image.data().len(),
    })?;
    dynamic.save(path).map_err(|e| image_err(path, e))
}

/// Encode a float image losslessly as OpenEXR. A single channel is
/// replicated into RGB.
///
/// # Errors
/// Returns [`CystoIoError::Core`] for channel counts other than 1 or 3 and
/// [`CystoIoError::Image`] on encoder failure.
pub fn save_exr(image: &Image, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let rgb = match image.channels() {
        3 => image.clone(),
        1 => image.select_channels(&[0, 0, 0])?,
        got => {
            return Err(CoreError::ChannelCountMismatch { expected: 3, got }.into());
        }
    };
    let buffer = Rgb32FImage::from_raw(rgb.width() as u32, rgb.height() as u32, rgb.to_hwc())
        .ok_or(CoreError::BufferSizeMismatch {
            expected: rgb.data().len(),
            got: rgb.data().len(),
        })?;
    DynamicImage::ImageRgb32F(buffer)
        .save(path)
        .map_err(|e| image_err(path, e))
}
