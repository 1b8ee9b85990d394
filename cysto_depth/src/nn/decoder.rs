//! Multi-scale decoder with skip connections.

use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig};
use burn::prelude::*;

use super::blocks::{ConvBlock, ConvBlockConfig};

/// Upsamples the bottleneck back to full resolution, concatenating the
/// encoder skip of each level, and emits a prediction at each of the
/// `num_scales` finest levels.
///
/// Outputs are ordered coarse to fine and are linear; activations are up to
/// the caller.
#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    /// Upsampling from level `i + 1` to level `i`, coarsest first.
    ups: Vec<ConvTranspose2d<B>>,
    /// Fusion of upsampled features and skip, coarsest first.
    fuse: Vec<ConvBlock<B>>,
    /// 1×1 output convolutions, coarse to fine.
    heads: Vec<Conv2d<B>>,
    num_scales: usize,
}

impl<B: Backend> Decoder<B> {
    /// Build a decoder mirroring an encoder with `channels` per level.
    ///
    /// # Arguments
    /// * `channels` - Encoder channels, finest first
    /// * `out_channels` - Channels of every output map
    /// * `num_scales` - Number of outputs, clamped to the number of levels
    pub fn new(channels: &[usize], out_channels: usize, num_scales: usize, device: &B::Device) -> Self {
        let levels = channels.len();
        let num_scales = num_scales.clamp(1, levels.max(1));
        let mut ups = Vec::new();
        let mut fuse = Vec::new();
        for level in (0..levels.saturating_sub(1)).rev() {
            let (deep, here) = (channels[level + 1], channels[level]);
            ups.push(
                ConvTranspose2dConfig::new([deep, here], [2, 2])
                    .with_stride([2, 2])
                    .init(device),
            );
            fuse.push(ConvBlockConfig::new(2 * here, here).init(device));
        }
        let heads = (0..num_scales)
            .rev()
            .map(|level| Conv2dConfig::new([channels[level], out_channels], [1, 1]).init(device))
            .collect();
        Self {
            ups,
            fuse,
            heads,
            num_scales,
        }
    }

    /// Number of output scales.
    pub fn num_scales(&self) -> usize {
        self.num_scales
    }

    /// Decode encoder skips (finest first) into `num_scales` maps, coarse to
    /// fine. Output `k` has resolution `H / 2^(num_scales - 1 - k)`.
    pub fn forward(&self, skips: &[Tensor<B, 4>]) -> Vec<Tensor<B, 4>> {
        let levels = skips.len();
        let mut outputs = Vec::with_capacity(self.num_scales);
        let Some(bottleneck) = skips.last() else {
            return outputs;
        };
        let mut x = bottleneck.clone();
        let mut heads = self.heads.iter();
        if levels - 1 < self.num_scales {
            if let Some(head) = heads.next() {
                outputs.push(head.forward(x.clone()));
            }
        }
        for (step, (up, fuse)) in self.ups.iter().zip(&self.fuse).enumerate() {
            let level = levels - 2 - step;
            let upsampled = up.forward(x);
            x = fuse.forward(Tensor::cat(vec![upsampled, skips[level].clone()], 1));
            if level < self.num_scales {
                if let Some(head) = heads.next() {
                    outputs.push(head.forward(x.clone()));
                }
            }
        }
        outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::Encoder;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_outputs_coarse_to_fine() {
        let device = Default::default();
        let channels = [4, 8, 16];
        let encoder = Encoder::<TestBackend>::new(3, &channels, &device);
        let decoder = Decoder::<TestBackend>::new(&channels, 1, 2, &device);
        let skips = encoder.forward(Tensor::zeros([2, 3, 16, 16], &device));
        let outs = decoder.forward(&skips);
        let dims: Vec<_> = outs.iter().map(|o| o.dims()).collect();
        assert_eq!(dims, vec![[2, 1, 8, 8], [2, 1, 16, 16]]);
    }

    #[test]
    fn test_all_scales_include_bottleneck() {
        let device = Default::default();
        let channels = [4, 8];
        let encoder = Encoder::<TestBackend>::new(3, &channels, &device);
        let decoder = Decoder::<TestBackend>::new(&channels, 3, 5, &device);
        assert_eq!(decoder.num_scales(), 2);
        let outs = decoder.forward(&encoder.forward(Tensor::zeros([1, 3, 8, 8], &device)));
        assert_eq!(outs[0].dims(), [1, 3, 4, 4]);
        assert_eq!(outs[1].dims(), [1, 3, 8, 8]);
    }
}
