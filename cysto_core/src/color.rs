//! Colour adjustments for 3-channel RGB images with values in `[0, 1]`.
//!
//! Brightness, contrast and saturation blend the image with a degenerate
//! image (black, mean grey, per-pixel grey) and clamp to `[0, 1]`. Hue shifts
//! the HSV hue channel.

use crate::error::CoreError;
use crate::image::Image;

const LUMA: [f32; 3] = [0.2989, 0.587, 0.114];

fn require_rgb(image: &Image) -> Result<(), CoreError> {
    if image.channels() != 3 {
        return Err(CoreError::ChannelCountMismatch {
            expected: 3,
            got: image.channels(),
        });
    }
    Ok(())
}

#[inline]
fn blend(a: f32, b: f32, ratio: f32) -> f32 {
    (ratio * a + (1.0 - ratio) * b).clamp(0.0, 1.0)
}

/// Single-channel luma image.
///
/// # Errors
/// Returns [`CoreError::ChannelCountMismatch`] unless the image is RGB.
pub fn grayscale(image: &Image) -> Result<Image, CoreError> {
    require_rgb(image)?;
    Ok(Image::from_fn(1, image.height(), image.width(), |_, y, x| {
        LUMA[0] * image.get(0, y, x) + LUMA[1] * image.get(1, y, x) + LUMA[2] * image.get(2, y, x)
    }))
}

/// Scale intensities by `factor`.
pub fn adjust_brightness(image: &Image, factor: f32) -> Image {
    image.clone().map(|v| blend(v, 0.0, factor))
}

/// Blend with the mean luma.
///
/// # Errors
/// Returns [`CoreError::ChannelCountMismatch`] unless the image is RGB.
pub fn adjust_contrast(image: &Image, factor: f32) -> Result<Image, CoreError> {
    let gray = grayscale(image)?;
    let n = gray.data().len().max(1) as f32;
    let mean = gray.data().iter().sum::<f32>() / n;
    Ok(image.clone().map(|v| blend(v, mean, factor)))
}

/// Blend with the per-pixel luma.
///
/// # Errors
/// Returns [`CoreError::ChannelCountMismatch`] unless the image is RGB.
pub fn adjust_saturation(image: &Image, factor: f32) -> Result<Image, CoreError> {
    let gray = grayscale(image)?;
    Ok(Image::from_fn(3, image.height(), image.width(), |c, y, x| {
        blend(image.get(c, y, x), gray.get(0, y, x), factor)
    }))
}

/// Rotate hue by `factor` turns, `factor` in `[-0.5, 0.5]`.
///
/// # Errors
/// Returns [`CoreError::ChannelCountMismatch`] unless the image is RGB.
pub fn adjust_hue(image: &Image, factor: f32) -> Result<Image, CoreError> {
    require_rgb(image)?;
    let mut out = image.clone();
    for y in 0..image.height() {
        for x in 0..image.width() {
            let rgb = [image.get(0, y, x), image.get(1, y, x), image.get(2, y, x)];
            let (h, s, v) = rgb_to_hsv(rgb);
            let h = h + factor;
            let h = h - libm::floorf(h);
            let [r, g, b] = hsv_to_rgb(h, s, v);
            out.set(0, y, x, r);
            out.set(1, y, x, g);
            out.set(2, y, x, b);
        }
    }
    Ok(out)
}

/// RGB to HSV, all components in `[0, 1]`.
pub fn rgb_to_hsv([r, g, b]: [f32; 3]) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let s = if max > 0.0 { delta / max } else { 0.0 };
    if delta == 0.0 {
        return (0.0, s, max);
    }
    let h = if max == r {
        let h = (g - b) / delta;
        if h < 0.0 {
            h + 6.0
        } else {
            h
        }
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };
    (h / 6.0, s, max)
}

/// HSV to RGB, all components in `[0, 1]`.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    let h6 = h * 6.0;
    let i = libm::floorf(h6);
    let f = h6 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (i as i32).rem_euclid(6) {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}
