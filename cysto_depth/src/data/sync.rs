//! Synchronized multi-channel transforms.
//!
//! A [`SyncTransform`] splits a stochastic transform into a shared draw and
//! a per-channel application. [`Synchronized`] performs one draw per call
//! and replays it on every channel with that channel's arguments, so the
//! colour image, the shading, the depth and the normals of a sample receive
//! exactly the same geometry.

use std::fmt::Debug;

use cysto_core::mask::apply_circular_mask;
use cysto_core::warp::{affine, AffineParams, Interpolation};
use cysto_core::{Image, ImageSize};
use rand::rngs::StdRng;
use rand::Rng;

use super::transforms::Transform;
use crate::error::{CystoDepthError, Result};

/// A transform whose random parameters are shared across channels.
pub trait SyncTransform: Send + Sync + Debug {
    /// Parameters drawn once per call.
    type Params: Debug + Clone;
    /// Per-channel arguments.
    type Args: Debug + Clone + Send + Sync;

    /// Draw the shared parameters for images of `size`.
    fn draw(&self, rng: &mut StdRng, size: ImageSize) -> Self::Params;

    /// Apply the drawn parameters to one channel. Channel-specific random
    /// extras are drawn from `rng` after every shared draw has happened.
    fn apply_channel(
        &self,
        image: Image,
        params: &Self::Params,
        args: &Self::Args,
        rng: &mut StdRng,
    ) -> Result<Image>;
}

/// A transform over all channels of a sample at once.
pub trait SampleTransform: Send + Sync + Debug {
    /// Transform every channel of one sample.
    fn apply(&self, channels: Vec<Image>, rng: &mut StdRng) -> Result<Vec<Image>>;
}

/// A [`SyncTransform`] bound to a fixed number of channels and their
/// arguments.
#[derive(Debug, Clone)]
pub struct Synchronized<T: SyncTransform> {
    transform: T,
    args: Vec<T::Args>,
}

impl<T: SyncTransform> Synchronized<T> {
    /// Bind `transform` to one argument list entry per channel.
    pub fn new(transform: T, args: Vec<T::Args>) -> Self {
        Self { transform, args }
    }

    /// Number of channels this transform expects.
    pub fn synchros(&self) -> usize {
        self.args.len()
    }

    /// The wrapped transform.
    pub fn transform(&self) -> &T {
        &self.transform
    }

    /// Apply to all channels and also return the shared parameters.
    ///
    /// # Errors
    /// Returns [`CystoDepthError::SyncArity`] if the number of channels
    /// differs from [`Synchronized::synchros`] and
    /// [`CystoDepthError::ShapeMismatch`] if the channels differ in size.
    pub fn apply_traced(
        &self,
        channels: Vec<Image>,
        rng: &mut StdRng,
    ) -> Result<(Vec<Image>, T::Params)> {
        if channels.len() != self.args.len() {
            return Err(CystoDepthError::SyncArity {
                expected: self.args.len(),
                got: channels.len(),
            });
        }
        let size = channels
            .first()
            .map(Image::size)
            .unwrap_or_default();
        if let Some(other) = channels.iter().find(|c| c.size() != size) {
            return Err(CystoDepthError::ShapeMismatch {
                expected: vec![size.height, size.width],
                got: vec![other.height(), other.width()],
            });
        }

        let params = self.transform.draw(rng, size);
        let out = channels
            .into_iter()
            .zip(&self.args)
            .map(|(image, args)| self.transform.apply_channel(image, &params, args, rng))
            .collect::<Result<Vec<_>>>()?;
        Ok((out, params))
    }
}

impl<T: SyncTransform> SampleTransform for Synchronized<T> {
    fn apply(&self, channels: Vec<Image>, rng: &mut StdRng) -> Result<Vec<Image>> {
        self.apply_traced(channels, rng).map(|(out, _)| out)
    }
}

/// What a channel's pixels outside the field of view become.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaskFill {
    /// A dark colour drawn uniformly from `[0, 0.1)` per channel and image.
    RandomDark,
    /// A fixed value for every channel.
    Value(f32),
    /// Leave this channel unmasked.
    Skip,
}

/// Circular endoscope mask with a random radius.
#[derive(Debug, Clone, Copy)]
pub struct EndoMask {
    radius_range: [f32; 2],
}

impl EndoMask {
    /// Mask whose radius factor is drawn from `radius_range`.
    pub fn new(radius_range: [f32; 2]) -> Self {
        Self { radius_range }
    }

    /// Mask with a fixed radius factor.
    pub fn fixed(radius_factor: f32) -> Self {
        Self::new([radius_factor, radius_factor])
    }
}

fn uniform(rng: &mut StdRng, [lo, hi]: [f32; 2]) -> f32 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}

impl SyncTransform for EndoMask {
    type Params = f32;
    type Args = MaskFill;

    fn draw(&self, rng: &mut StdRng, _size: ImageSize) -> f32 {
        uniform(rng, self.radius_range)
    }

    fn apply_channel(
        &self,
        mut image: Image,
        radius_factor: &f32,
        fill: &MaskFill,
        rng: &mut StdRng,
    ) -> Result<Image> {
        let fill: Vec<f32> = match fill {
            MaskFill::Skip => return Ok(image),
            MaskFill::Value(v) => vec![*v],
            MaskFill::RandomDark => (0..image.channels())
                .map(|_| rng.gen::<f32>() / 10.0)
                .collect(),
        };
        apply_circular_mask(&mut image, *radius_factor, &fill)?;
        Ok(image)
    }
}

/// Per-channel options of [`RandomAffine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AffineArgs {
    /// Fill uncovered pixels with the mean of the corner pixels instead of 0.
    pub corner_fill: bool,
    /// Re-apply a full circular mask (fill 0) after warping.
    pub remask: bool,
}

impl AffineArgs {
    /// Corner-colour fill, no re-mask.
    pub const CORNER_FILL: Self = Self {
        corner_fill: true,
        remask: false,
    };
    /// Zero fill, no re-mask.
    pub const ZERO_FILL: Self = Self {
        corner_fill: false,
        remask: false,
    };
    /// Zero fill followed by a re-mask.
    pub const REMASK: Self = Self {
        corner_fill: false,
        remask: true,
    };
}

/// Random rotation about the image centre plus random translation,
/// sampled with nearest neighbour.
#[derive(Debug, Clone, Copy)]
pub struct RandomAffine {
    degrees: [f32; 2],
    translate: [f32; 2],
}

impl RandomAffine {
    /// Angle drawn from `degrees`; translation from
    /// `±translate · (width, height)`, rounded to whole pixels.
    pub fn new(degrees: [f32; 2], translate: [f32; 2]) -> Self {
        Self { degrees, translate }
    }
}

impl SyncTransform for RandomAffine {
    type Params = AffineParams;
    type Args = AffineArgs;

    fn draw(&self, rng: &mut StdRng, size: ImageSize) -> AffineParams {
        let angle = uniform(rng, self.degrees);
        let max_dx = self.translate[0] * size.width as f32;
        let max_dy = self.translate[1] * size.height as f32;
        let dx = uniform(rng, [-max_dx, max_dx]).round();
        let dy = uniform(rng, [-max_dy, max_dy]).round();
        AffineParams::rotation(angle).with_translation(dx, dy)
    }

    fn apply_channel(
        &self,
        image: Image,
        params: &AffineParams,
        args: &AffineArgs,
        _rng: &mut StdRng,
    ) -> Result<Image> {
        let fill = if args.corner_fill {
            image.corner_color()?
        } else {
            vec![0.0]
        };
        let mut out = affine(&image, params, Interpolation::Nearest, &fill)?;
        if args.remask {
            apply_circular_mask(&mut out, 1.0, &[0.0])?;
        }
        Ok(out)
    }
}

/// Apply a [`Transform`] to one channel of a sample.
#[derive(Debug)]
pub struct OnChannel {
    index: usize,
    transform: Box<dyn Transform>,
}

impl OnChannel {
    /// Run `transform` on channel `index`.
    pub fn new(index: usize, transform: impl Transform + 'static) -> Self {
        Self {
            index,
            transform: Box::new(transform),
        }
    }
}

impl SampleTransform for OnChannel {
    fn apply(&self, mut channels: Vec<Image>, rng: &mut StdRng) -> Result<Vec<Image>> {
        let len = channels.len();
        let slot = channels.get_mut(self.index).ok_or_else(|| {
            CystoDepthError::missing("indexed", format!("channel {} of {len}", self.index))
        })?;
        let image = std::mem::replace(slot, Image::zeros(0, 0, 0));
        *slot = self.transform.apply(image, rng)?;
        Ok(channels)
    }
}
