//! Side-by-side comparison figures.
//!
//! Every figure is an `[input | prediction | ground truth]` strip in RGB
//! with values in `[0, 1]`.

use cysto_core::image::hstack;
use cysto_core::Image;

use crate::error::Result;

/// Grey rendering of a one-channel depth map scaled by `[0, max]`.
///
/// # Errors
/// Returns an image error if `depth` has no channel.
pub fn depth_to_rgb(depth: &Image, max: f32) -> Result<Image> {
    let scale = if max > 0.0 { 1.0 / max } else { 0.0 };
    Ok(depth
        .select_channels(&[0, 0, 0])?
        .map(|v| (v * scale).clamp(0.0, 1.0)))
}

/// Normals mapped from `[-1, 1]` to `[0, 1]`.
pub fn normals_to_rgb(normals: &Image) -> Image {
    normals.clone().map(|v| ((v + 1.0) * 0.5).clamp(0.0, 1.0))
}

fn clamp_unit(image: &Image) -> Image {
    image.clone().map(|v| v.clamp(0.0, 1.0))
}

/// Depth strip; prediction and ground truth share the ground truth's
/// `[0, max]` range.
///
/// # Errors
/// Returns an image error if the parts differ in height.
pub fn depth_figure(input: &Image, pred: &Image, gt: &Image) -> Result<Image> {
    let max = gt.min_max().map_or(0.0, |(_, max)| max);
    Ok(hstack(&[
        clamp_unit(input),
        depth_to_rgb(pred, max)?,
        depth_to_rgb(gt, max)?,
    ])?)
}

/// Normals strip.
///
/// # Errors
/// Returns an image error if the parts differ in height.
pub fn normals_figure(input: &Image, pred: &Image, gt: &Image) -> Result<Image> {
    Ok(hstack(&[
        clamp_unit(input),
        normals_to_rgb(pred),
        normals_to_rgb(gt),
    ])?)
}

/// Shading strip.
///
/// # Errors
/// Returns an image error if the parts differ in height.
pub fn phong_figure(input: &Image, pred: &Image, gt: &Image) -> Result<Image> {
    Ok(hstack(&[clamp_unit(input), clamp_unit(pred), clamp_unit(gt)])?)
}
