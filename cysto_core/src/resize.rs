//! Centre crop and bilinear resize.
//!
//! [`squarify`] is what every modality goes through before augmentation:
//! crop the centre square, then resize it to the working resolution.

use crate::image::Image;
use crate::types::ImageSize;
use crate::warp::sample_bilinear;

/// Crop the centred `size` window. Offsets round down.
///
/// A window larger than the image is clamped to the image extent.
pub fn center_crop(image: &Image, size: ImageSize) -> Image {
    let height = size.height.min(image.height());
    let width = size.width.min(image.width());
    let top = (image.height() - height) / 2;
    let left = (image.width() - width) / 2;
    Image::from_fn(image.channels(), height, width, |c, y, x| {
        image.get(c, top + y, left + x)
    })
}

/// Bilinear resize with half-pixel centres and no antialiasing.
pub fn resize_bilinear(image: &Image, size: ImageSize) -> Image {
    if image.size() == size {
        return image.clone();
    }
    let scale_y = image.height() as f32 / size.height as f32;
    let scale_x = image.width() as f32 / size.width as f32;
    Image::from_fn(image.channels(), size.height, size.width, |c, y, x| {
        let fy = (y as f32 + 0.5) * scale_y - 0.5;
        let fx = (x as f32 + 0.5) * scale_x - 0.5;
        sample_bilinear(image, c, fx, fy)
    })
}

/// Crop to the centre square of the shorter side, then resize to
/// `target x target` when a target is given.
///
/// An image that is already `target` square is returned unchanged.
pub fn squarify(image: &Image, target: Option<usize>) -> Image {
    let side = image.size().shorter_side();
    let cropped = if image.size().is_square() {
        image.clone()
    } else {
        center_crop(image, ImageSize::square(side))
    };
    match target {
        Some(t) if t != side => resize_bilinear(&cropped, ImageSize::square(t)),
        _ => cropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_crop_offsets() {
        let img = Image::from_fn(1, 3, 6, |_, y, x| (y * 10 + x) as f32);
        let out = center_crop(&img, ImageSize::square(3));
        // (6 - 3) / 2 = 1 column offset
        assert_eq!(out.get(0, 0, 0), 1.0);
        assert_eq!(out.get(0, 2, 2), 23.0);
    }

    #[test]
    fn test_squarify_without_target_keeps_side() {
        let img = Image::zeros(3, 480, 640);
        let out = squarify(&img, None);
        assert_eq!(out.size(), ImageSize::square(480));
    }

    #[test]
    fn test_squarify_resizes() {
        let img = Image::zeros(3, 480, 640);
        let out = squarify(&img, Some(64));
        assert_eq!(out.shape(), [3, 64, 64]);
    }

    #[test]
    fn test_squarify_identity_on_target_square() {
        let img = Image::from_fn(1, 8, 8, |_, y, x| (y * 8 + x) as f32);
        assert_eq!(squarify(&img, Some(8)), img);
    }

    #[test]
    fn test_downsample_by_two_averages_pairs() {
        let img = Image::from_fn(1, 2, 4, |_, _, x| x as f32);
        let out = resize_bilinear(&img, ImageSize::new(1, 2));
        assert!((out.get(0, 0, 0) - 0.5).abs() < 1e-6);
        assert!((out.get(0, 0, 1) - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_constant_image_stays_constant() {
        let img = Image::filled(2, 5, 7, 0.25);
        let out = resize_bilinear(&img, ImageSize::new(9, 3));
        assert!(out.data().iter().all(|&v| (v - 0.25).abs() < 1e-6));
    }
}
