//! Single-channel transforms.
//!
//! A [`Transform`] maps one image of a sample to a new image. Stochastic
//! transforms draw from the per-sample generator they are handed, never from
//! global state.

use std::fmt::Debug;

use cysto_core::color::{adjust_brightness, adjust_contrast, adjust_hue, adjust_saturation};
use cysto_core::{squarify, Image};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::ColorJitterConfig;
use crate::error::Result;

/// A transform applied to a single channel of a sample.
pub trait Transform: Send + Sync + Debug {
    /// Transform `image`, drawing any randomness from `rng`.
    fn apply(&self, image: Image, rng: &mut StdRng) -> Result<Image>;
}

/// Random brightness, contrast, saturation and hue, applied in a random
/// order. Requires RGB input.
#[derive(Debug, Clone)]
pub struct ColorJitter {
    config: ColorJitterConfig,
}

impl ColorJitter {
    /// Jitter with the given strengths.
    pub fn new(config: ColorJitterConfig) -> Self {
        Self { config }
    }
}

fn factor(rng: &mut StdRng, strength: f32) -> Option<f32> {
    (strength > 0.0).then(|| rng.gen_range((1.0 - strength).max(0.0)..=1.0 + strength))
}

impl Transform for ColorJitter {
    fn apply(&self, image: Image, rng: &mut StdRng) -> Result<Image> {
        let mut order = [0usize, 1, 2, 3];
        order.shuffle(rng);
        let brightness = factor(rng, self.config.brightness);
        let contrast = factor(rng, self.config.contrast);
        let saturation = factor(rng, self.config.saturation);
        let hue = (self.config.hue > 0.0)
            .then(|| rng.gen_range(-self.config.hue..=self.config.hue));

        let mut image = image;
        for op in order {
            image = match (op, brightness, contrast, saturation, hue) {
                (0, Some(f), ..) => adjust_brightness(&image, f),
                (1, _, Some(f), ..) => adjust_contrast(&image, f)?,
                (2, _, _, Some(f), _) => adjust_saturation(&image, f)?,
                (3, .., Some(f)) => adjust_hue(&image, f)?,
                _ => image,
            };
        }
        Ok(image)
    }
}

/// Multiply every value by a constant.
#[derive(Debug, Clone, Copy)]
pub struct ElementWiseScale(pub f32);

impl Transform for ElementWiseScale {
    fn apply(&self, image: Image, _rng: &mut StdRng) -> Result<Image> {
        let scale = self.0;
        Ok(image.map(|v| v * scale))
    }
}

/// Keep a single channel. Depth EXRs repeat the depth in every channel.
#[derive(Debug, Clone, Copy)]
pub struct ChannelSlice(pub usize);

impl Transform for ChannelSlice {
    fn apply(&self, image: Image, _rng: &mut StdRng) -> Result<Image> {
        Ok(image.select_channels(&[self.0])?)
    }
}

/// Map values stored in `[0, 1]` to `[-1, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct UnitToSigned;

impl Transform for UnitToSigned {
    fn apply(&self, image: Image, _rng: &mut StdRng) -> Result<Image> {
        Ok(image.map(|v| v * 2.0 - 1.0))
    }
}

/// Centre crop to a square, then resize to `size` if set.
#[derive(Debug, Clone, Copy)]
pub struct Squarify(pub Option<usize>);

impl Transform for Squarify {
    fn apply(&self, image: Image, _rng: &mut StdRng) -> Result<Image> {
        Ok(squarify(&image, self.0))
    }
}
