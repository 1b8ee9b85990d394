//! Circular endoscope field-of-view mask.
//!
//! The scope only sees a disc; everything outside it is replaced with a fill
//! value. The disc is centred at `(w/2, h/2)` with radius
//! `min(h, w) / 2 * radius_factor`, measured to pixel centres.

use crate::error::CoreError;
use crate::image::Image;

/// Whether the pixel centre at `(row, col)` lies inside the disc.
#[inline]
pub fn inside_circle(height: usize, width: usize, radius_factor: f32, y: usize, x: usize) -> bool {
    let cy = height as f32 / 2.0;
    let cx = width as f32 / 2.0;
    let radius = height.min(width) as f32 / 2.0 * radius_factor;
    let dy = y as f32 + 0.5 - cy;
    let dx = x as f32 + 0.5 - cx;
    dx * dx + dy * dy <= radius * radius
}

/// Set every pixel outside the disc to `fill`.
///
/// `fill` holds one value per channel or a single value for all channels.
///
/// # Errors
/// Returns [`CoreError::FillLengthMismatch`] for a bad fill.
pub fn apply_circular_mask(image: &mut Image, radius_factor: f32, fill: &[f32]) -> Result<(), CoreError> {
    image.check_fill(fill)?;
    let (h, w) = (image.height(), image.width());
    for y in 0..h {
        for x in 0..w {
            if !inside_circle(h, w, radius_factor, y, x) {
                image.fill_pixel(y, x, fill);
            }
        }
    }
    Ok(())
}

/// Number of pixels inside the disc.
pub fn masked_area(height: usize, width: usize, radius_factor: f32) -> usize {
    let mut count = 0;
    for y in 0..height {
        for x in 0..width {
            if inside_circle(height, width, radius_factor, y, x) {
                count += 1;
            }
        }
    }
    count
}
