//! Convolutional encoder producing skip features.

use burn::module::Module;
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::prelude::*;

use super::blocks::{ConvBlock, ConvBlockConfig};

/// Encoder with one [`ConvBlock`] per level and 2×2 max pooling between
/// levels.
#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    levels: Vec<ConvBlock<B>>,
    pool: MaxPool2d,
}

impl<B: Backend> Encoder<B> {
    /// Build an encoder with `channels[i]` features at level `i`.
    pub fn new(in_channels: usize, channels: &[usize], device: &B::Device) -> Self {
        let mut levels = Vec::with_capacity(channels.len());
        let mut prev = in_channels;
        for &c in channels {
            levels.push(ConvBlockConfig::new(prev, c).init(device));
            prev = c;
        }
        Self {
            levels,
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    /// Number of levels.
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Skip features of every level, finest first. Level `i` has resolution
    /// `H / 2^i`; the last entry is the bottleneck.
    pub fn forward(&self, input: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        let mut skips: Vec<Tensor<B, 4>> = Vec::with_capacity(self.levels.len());
        let mut x = input;
        for (i, level) in self.levels.iter().enumerate() {
            if i > 0 {
                x = self.pool.forward(x);
            }
            x = level.forward(x);
            skips.push(x.clone());
        }
        skips
    }
}
