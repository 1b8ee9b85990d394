//! Pinhole camera intrinsics and per-pixel viewing rays.

use crate::error::CoreError;
use crate::image::Image;
use crate::types::{ImageSize, Vec3};

/// Pinhole intrinsics `K = [[fx, s, cx], [0, fy, cy], [0, 0, 1]]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    /// Focal length along x, in pixels.
    pub fx: f32,
    /// Focal length along y, in pixels.
    pub fy: f32,
    /// Principal point x.
    pub cx: f32,
    /// Principal point y.
    pub cy: f32,
    /// Axis skew.
    pub skew: f32,
}

impl CameraIntrinsics {
    /// Intrinsics without skew.
    pub fn new(fx: f32, fy: f32, cx: f32, cy: f32) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            skew: 0.0,
        }
    }

    /// Read a row-major 3x3 matrix.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidIntrinsics`] when the last row is not
    /// `[0, 0, 1]` or a focal length is zero.
    pub fn from_matrix(k: [[f32; 3]; 3]) -> Result<Self, CoreError> {
        if k[1][0] != 0.0 || k[2] != [0.0, 0.0, 1.0] {
            return Err(CoreError::InvalidIntrinsics {
                reason: "matrix is not upper triangular with k22 = 1",
            });
        }
        if k[0][0] == 0.0 || k[1][1] == 0.0 {
            return Err(CoreError::InvalidIntrinsics {
                reason: "zero focal length",
            });
        }
        Ok(Self {
            fx: k[0][0],
            fy: k[1][1],
            cx: k[0][2],
            cy: k[1][2],
            skew: k[0][1],
        })
    }

    /// Row-major 3x3 matrix.
    pub fn to_matrix(&self) -> [[f32; 3]; 3] {
        [
            [self.fx, self.skew, self.cx],
            [0.0, self.fy, self.cy],
            [0.0, 0.0, 1.0],
        ]
    }

    /// Size of the image the intrinsics were calibrated on, assuming the
    /// principal point sits at the image centre: `(round(2 cy), round(2 cx))`.
    pub fn image_size(&self) -> ImageSize {
        ImageSize::new(
            libm::roundf(2.0 * self.cy) as usize,
            libm::roundf(2.0 * self.cx) as usize,
        )
    }

    /// Back-project a pixel coordinate to a ray with `z = 1`.
    #[inline]
    pub fn unproject(&self, u: f32, v: f32) -> Vec3 {
        let y = (v - self.cy) / self.fy;
        let x = (u - self.cx - self.skew * y) / self.fx;
        Vec3::new(x, y, 1.0)
    }

    /// Project a camera-space point to pixel coordinates.
    #[inline]
    pub fn project(&self, p: Vec3) -> (f32, f32) {
        let x = p.x / p.z;
        let y = p.y / p.z;
        (self.fx * x + self.skew * y + self.cx, self.fy * y + self.cy)
    }
}

/// Two-channel map of pixel-centre coordinates `(u, v)` for an image of the
/// given size.
pub fn pixel_locations(size: ImageSize) -> Image {
    Image::from_fn(2, size.height, size.width, |c, y, x| {
        if c == 0 {
            x as f32 + 0.5
        } else {
            y as f32 + 0.5
        }
    })
}

/// Turn a `(u, v)` location map into a 3-channel ray map with `z = 1`.
///
/// # Errors
/// Returns [`CoreError::ChannelCountMismatch`] unless `locations` has two
/// channels.
pub fn rays_from_locations(k: &CameraIntrinsics, locations: &Image) -> Result<Image, CoreError> {
    if locations.channels() != 2 {
        return Err(CoreError::ChannelCountMismatch {
            expected: 2,
            got: locations.channels(),
        });
    }
    let mut rays = Image::zeros(3, locations.height(), locations.width());
    for y in 0..locations.height() {
        for x in 0..locations.width() {
            let ray = k.unproject(locations.get(0, y, x), locations.get(1, y, x));
            rays.set(0, y, x, ray.x);
            rays.set(1, y, x, ray.y);
            rays.set(2, y, x, ray.z);
        }
    }
    Ok(rays)
}
