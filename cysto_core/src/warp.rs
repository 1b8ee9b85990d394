//! Affine warps about the image centre.
//!
//! Output pixels are pulled from the source through the inverse transform;
//! samples that land outside the source take the fill value.

use crate::error::CoreError;
use crate::image::Image;

/// How source values are read at non-integer positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Nearest source pixel.
    #[default]
    Nearest,
    /// Bilinear blend of the four neighbouring pixels.
    Bilinear,
}

/// Rotation plus translation of an image about its centre.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AffineParams {
    /// Rotation in degrees, counter-clockwise as displayed.
    pub angle_deg: f32,
    /// Horizontal shift in pixels (positive moves content right).
    pub translate_x: f32,
    /// Vertical shift in pixels (positive moves content down).
    pub translate_y: f32,
}

impl AffineParams {
    /// A pure rotation.
    pub fn rotation(angle_deg: f32) -> Self {
        Self {
            angle_deg,
            ..Self::default()
        }
    }

    /// Add a translation.
    pub fn with_translation(mut self, x: f32, y: f32) -> Self {
        self.translate_x = x;
        self.translate_y = y;
        self
    }

    /// Map an output position to the source position it samples.
    #[inline]
    fn source_of(&self, cx: f32, cy: f32, px: f32, py: f32) -> (f32, f32) {
        let theta = self.angle_deg.to_radians();
        let (sin, cos) = libm::sincosf(theta);
        let dx = px - cx - self.translate_x;
        let dy = py - cy - self.translate_y;
        (cx + dx * cos - dy * sin, cy + dx * sin + dy * cos)
    }
}

/// Warp `image` with `params`, writing `fill` where the source is out of view.
///
/// # Errors
/// Returns [`CoreError::FillLengthMismatch`] for a bad fill.
pub fn affine(image: &Image, params: &AffineParams, interpolation: Interpolation, fill: &[f32]) -> Result<Image, CoreError> {
    image.check_fill(fill)?;
    let (h, w) = (image.height(), image.width());
    let cx = w as f32 / 2.0;
    let cy = h as f32 / 2.0;
    let mut out = Image::zeros(image.channels(), h, w);
    for y in 0..h {
        for x in 0..w {
            let (sx, sy) = params.source_of(cx, cy, x as f32 + 0.5, y as f32 + 0.5);
            match interpolation {
                Interpolation::Nearest => {
                    let ix = libm::floorf(sx);
                    let iy = libm::floorf(sy);
                    if ix < 0.0 || iy < 0.0 || ix >= w as f32 || iy >= h as f32 {
                        out.fill_pixel(y, x, fill);
                        continue;
                    }
                    for c in 0..image.channels() {
                        out.set(c, y, x, image.get(c, iy as usize, ix as usize));
                    }
                }
                Interpolation::Bilinear => {
                    let fx = sx - 0.5;
                    let fy = sy - 0.5;
                    if fx < -0.5 || fy < -0.5 || fx > w as f32 - 0.5 || fy > h as f32 - 0.5 {
                        out.fill_pixel(y, x, fill);
                        continue;
                    }
                    for c in 0..image.channels() {
                        out.set(c, y, x, sample_bilinear(image, c, fx, fy));
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Bilinear sample at continuous index `(fx, fy)`, clamping to the border.
#[inline]
pub fn sample_bilinear(image: &Image, c: usize, fx: f32, fy: f32) -> f32 {
    let max_x = image.width().saturating_sub(1) as f32;
    let max_y = image.height().saturating_sub(1) as f32;
    let fx = fx.clamp(0.0, max_x);
    let fy = fy.clamp(0.0, max_y);
    let x0 = libm::floorf(fx) as usize;
    let y0 = libm::floorf(fy) as usize;
    let x1 = (x0 + 1).min(image.width() - 1);
    let y1 = (y0 + 1).min(image.height() - 1);
    let tx = fx - x0 as f32;
    let ty = fy - y0 as f32;
    let top = image.get(c, y0, x0) * (1.0 - tx) + image.get(c, y0, x1) * tx;
    let bottom = image.get(c, y1, x0) * (1.0 - tx) + image.get(c, y1, x1) * tx;
    top * (1.0 - ty) + bottom * ty
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Image {
        Image::from_fn(1, 4, 6, |_, y, x| (y * 6 + x) as f32)
    }

    #[test]
    fn test_identity() {
        let img = ramp();
        let out = affine(&img, &AffineParams::default(), Interpolation::Nearest, &[0.0]).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn test_half_turn_flips_both_axes() {
        let img = ramp();
        let out = affine(&img, &AffineParams::rotation(180.0), Interpolation::Nearest, &[-1.0]).unwrap();
        for y in 0..4 {
            for x in 0..6 {
                assert_eq!(out.get(0, y, x), img.get(0, 3 - y, 5 - x));
            }
        }
    }

    #[test]
    fn test_translation_fills_uncovered_region() {
        let img = ramp();
        let params = AffineParams::default().with_translation(2.0, 0.0);
        let out = affine(&img, &params, Interpolation::Nearest, &[-1.0]).unwrap();
        assert_eq!(out.get(0, 0, 0), -1.0);
        assert_eq!(out.get(0, 0, 1), -1.0);
        assert_eq!(out.get(0, 0, 2), img.get(0, 0, 0));
    }

    #[test]
    fn test_bilinear_identity() {
        let img = ramp();
        let out = affine(&img, &AffineParams::default(), Interpolation::Bilinear, &[0.0]).unwrap();
        for (a, b) in out.data().iter().zip(img.data()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_sample_bilinear_midpoint() {
        let img = Image::from_fn(1, 1, 2, |_, _, x| x as f32 * 2.0);
        assert!((sample_bilinear(&img, 0, 0.5, 0.0) - 1.0).abs() < 1e-6);
    }
}
