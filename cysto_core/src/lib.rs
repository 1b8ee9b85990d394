//! # cysto_core
//!
//! Pure image math for the cystoscopy depth pipeline.
//!
//! Everything here works on plain float buffers and has no notion of files,
//! tensors or randomness. The stochastic transforms in `cysto_depth` draw
//! their parameters and then call into these functions.
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables standard library support (`std::error::Error`)
//!
//! Without `std` the crate needs only `alloc`.
//!
//! ## Modules
//!
//! - [`types`]: [`Vec3`] and [`ImageSize`]
//! - [`image`]: CHW float [`Image`] buffer and strip assembly
//! - [`intrinsics`]: pinhole camera model, pixel-location and ray maps
//! - [`mask`]: circular field-of-view mask
//! - [`warp`]: rotation/translation about the image centre
//! - [`resize`]: centre crop, bilinear resize, [`squarify`]
//! - [`color`]: brightness, contrast, saturation and hue
//! - [`error`]: Error types
//!
//! ## Usage
//!
//! ```ignore
//! use cysto_core::prelude::*;
//!
//! let k = CameraIntrinsics::new(500.0, 500.0, 320.0, 240.0);
//! let locations = squarify(&pixel_locations(k.image_size()), Some(256));
//! let rays = rays_from_locations(&k, &locations)?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

pub mod color;
pub mod error;
pub mod image;
pub mod intrinsics;
pub mod mask;
pub mod resize;
pub mod types;
pub mod warp;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::color::{
        adjust_brightness, adjust_contrast, adjust_hue, adjust_saturation, grayscale,
    };
    pub use crate::error::CoreError;
    pub use crate::image::{hstack, vstack, Image};
    pub use crate::intrinsics::{pixel_locations, rays_from_locations, CameraIntrinsics};
    pub use crate::mask::apply_circular_mask;
    pub use crate::resize::{center_crop, resize_bilinear, squarify};
    pub use crate::types::{ImageSize, Vec3};
    pub use crate::warp::{affine, AffineParams, Interpolation};
}

pub use error::CoreError;
pub use image::Image;
pub use intrinsics::{pixel_locations, rays_from_locations, CameraIntrinsics};
pub use resize::squarify;
pub use types::{ImageSize, Vec3};

#[cfg(test)]
mod integration_tests {
    use super::prelude::*;

    #[test]
    fn test_ray_field_matches_squarified_image() {
        let k = CameraIntrinsics::new(200.0, 200.0, 64.0, 48.0);
        let size = k.image_size();
        assert_eq!(size, ImageSize::new(96, 128));

        let locations = squarify(&pixel_locations(size), Some(32));
        let rays = rays_from_locations(&k, &locations).unwrap();
        assert_eq!(rays.shape(), [3, 32, 32]);

        // Centre crop keeps the optical axis at the centre of the square.
        let centre_x = (rays.get(0, 15, 15) + rays.get(0, 16, 16)) / 2.0;
        let centre_y = (rays.get(1, 15, 15) + rays.get(1, 16, 16)) / 2.0;
        assert!(centre_x.abs() < 1e-3);
        assert!(centre_y.abs() < 1e-3);
    }

    #[test]
    fn test_mask_after_rotation_restores_border() {
        let img = Image::filled(3, 16, 16, 1.0);
        let mut rotated = affine(&img, &AffineParams::rotation(45.0), Interpolation::Nearest, &[0.0])
            .unwrap();
        apply_circular_mask(&mut rotated, 1.0, &[0.0]).unwrap();
        assert_eq!(rotated.get(0, 8, 8), 1.0);
        assert_eq!(rotated.get(0, 0, 0), 0.0);
    }
}
