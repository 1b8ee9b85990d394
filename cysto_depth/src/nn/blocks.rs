//! Convolutional building blocks.

use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{PaddingConfig2d, Relu};
use burn::prelude::*;

/// Configuration of a [`ConvBlock`].
#[derive(Config, Debug)]
pub struct ConvBlockConfig {
    /// Input channels.
    pub in_channels: usize,
    /// Output channels.
    pub out_channels: usize,
}

impl ConvBlockConfig {
    /// Initialize the block.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvBlock<B> {
        let conv = |i, o| {
            Conv2dConfig::new([i, o], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device)
        };
        ConvBlock {
            first: conv(self.in_channels, self.out_channels),
            second: conv(self.out_channels, self.out_channels),
            activation: Relu::new(),
        }
    }
}

/// Two 3×3 convolutions with ReLU, keeping the resolution.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    first: Conv2d<B>,
    second: Conv2d<B>,
    activation: Relu,
}

impl<B: Backend> ConvBlock<B> {
    /// `[batch, in, H, W] -> [batch, out, H, W]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.activation.forward(self.first.forward(x));
        self.activation.forward(self.second.forward(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_conv_block_shape() {
        let device = Default::default();
        let block = ConvBlockConfig::new(3, 8).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::ones([2, 3, 6, 10], &device);
        let y = block.forward(x);
        assert_eq!(y.dims(), [2, 8, 6, 10]);
        // ReLU output
        let min = y.min().into_scalar();
        assert!(min >= 0.0);
    }
}
