//! Per-pixel camera rays at the working resolution.

use std::sync::Arc;

use burn::prelude::*;
use cysto_core::{pixel_locations, rays_from_locations, squarify, CameraIntrinsics, Image, ImageSize};

use crate::convert::image_to_tensor;
use crate::error::Result;

/// Ray directions (`z = 1`) of every pixel after the same squarify step the
/// images go through.
///
/// The field is computed once per data module and shared read-only by every
/// fetch; cloning is cheap.
#[derive(Debug, Clone)]
pub struct PixelRays {
    rays: Arc<Image>,
}

impl PixelRays {
    /// Build the ray field for a square working size.
    ///
    /// The original frame size is taken from the intrinsics (`2·cy × 2·cx`);
    /// its pixel-centre map is squarified to `size` and back-projected.
    ///
    /// # Errors
    /// Returns [`crate::CystoDepthError::Image`] on an invalid location map.
    pub fn new(intrinsics: &CameraIntrinsics, size: usize) -> Result<Self> {
        let locations = squarify(&pixel_locations(intrinsics.image_size()), Some(size));
        let rays = rays_from_locations(intrinsics, &locations)?;
        Ok(Self {
            rays: Arc::new(rays),
        })
    }

    /// Use an already computed 3-channel ray map.
    pub fn from_image(rays: Image) -> Self {
        Self {
            rays: Arc::new(rays),
        }
    }

    /// Spatial size of the field.
    pub fn size(&self) -> ImageSize {
        self.rays.size()
    }

    /// The 3-channel ray map.
    pub fn image(&self) -> &Image {
        &self.rays
    }

    /// Upload as a `[1, 3, H, W]` tensor.
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 4> {
        image_to_tensor::<B>(&self.rays, device).unsqueeze::<4>()
    }
}
