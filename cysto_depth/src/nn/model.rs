//! Depth and surface-normal estimation network.

use burn::module::Module;
use burn::nn::Relu;
use burn::prelude::*;

use super::decoder::Decoder;
use super::encoder::Encoder;
use crate::config::DepthModelConfig;

/// Network predictions for one batch.
#[derive(Debug, Clone)]
pub struct DepthOutput<B: Backend> {
    /// Depth maps `[batch, 1, h, w]`, coarse to fine.
    pub depth: Vec<Tensor<B, 4>>,
    /// Normals `[batch, 3, H, W]` at the finest scale, if predicted.
    pub normals: Option<Tensor<B, 4>>,
}

impl<B: Backend> DepthOutput<B> {
    /// The full-resolution depth map.
    pub fn finest_depth(&self) -> Option<&Tensor<B, 4>> {
        self.depth.last()
    }
}

/// Encoder plus one merged or two separate decoders.
///
/// With a merged decoder every head has four channels: depth in channel 0
/// and normals in channels 1..4 of the finest head. Otherwise a second
/// decoder produces a single 3-channel normals map. Depth is
/// ReLU-activated; normals are linear and zeroed wherever the finest
/// depth is below `min_depth`.
#[derive(Module, Debug)]
pub struct DepthNormalModel<B: Backend> {
    pub(crate) encoder: Encoder<B>,
    pub(crate) depth_decoder: Decoder<B>,
    pub(crate) normals_decoder: Option<Decoder<B>>,
    activation: Relu,
    predict_normals: bool,
    merged_decoder: bool,
    min_depth: f32,
}

impl DepthModelConfig {
    /// Initialize the network on `device`.
    pub fn init<B: Backend>(&self, device: &B::Device) -> DepthNormalModel<B> {
        let channels = &self.encoder_channels;
        let normals_decoder = self
            .separate_normals_decoder()
            .then(|| Decoder::new(channels, 3, 1, device));
        DepthNormalModel {
            encoder: Encoder::new(self.in_channels, channels, device),
            depth_decoder: Decoder::new(channels, self.depth_head_channels(), self.num_scales, device),
            normals_decoder,
            activation: Relu::new(),
            predict_normals: self.predict_normals,
            merged_decoder: self.merged_decoder,
            min_depth: self.min_depth,
        }
    }
}

impl<B: Backend> DepthNormalModel<B> {
    /// Whether normals are predicted.
    pub fn predicts_normals(&self) -> bool {
        self.predict_normals
    }

    /// Forward pass over a `[batch, 3, H, W]` colour batch.
    pub fn forward(&self, input: Tensor<B, 4>) -> DepthOutput<B> {
        let skips = self.encoder.forward(input);
        let raw = self.depth_decoder.forward(&skips);

        let (depth, normals) = if self.predict_normals && self.merged_decoder {
            let normals = raw.last().map(|head| head.clone().narrow(1, 1, 3));
            let depth = raw
                .into_iter()
                .map(|head| self.activation.forward(head.narrow(1, 0, 1)))
                .collect::<Vec<_>>();
            (depth, normals)
        } else {
            let depth = raw
                .into_iter()
                .map(|head| self.activation.forward(head))
                .collect::<Vec<_>>();
            let normals = self
                .normals_decoder
                .as_ref()
                .and_then(|decoder| decoder.forward(&skips).pop());
            (depth, normals)
        };

        let normals = match (normals, depth.last()) {
            (Some(n), Some(fine)) => {
                let valid = fine.clone().greater_equal_elem(self.min_depth).float();
                Some(n * valid)
            }
            (n, _) => n,
        };
        DepthOutput { depth, normals }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn small_config() -> DepthModelConfig {
        DepthModelConfig::new()
            .with_encoder_channels(vec![4, 8, 8])
            .with_num_scales(3)
    }

    #[test]
    fn test_separate_decoders() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device);
        let out = model.forward(Tensor::random(
            [2, 3, 16, 16],
            burn::tensor::Distribution::Default,
            &device,
        ));
        let dims: Vec<_> = out.depth.iter().map(|d| d.dims()).collect();
        assert_eq!(dims, vec![[2, 1, 4, 4], [2, 1, 8, 8], [2, 1, 16, 16]]);
        assert_eq!(out.normals.as_ref().unwrap().dims(), [2, 3, 16, 16]);
        assert!(out.finest_depth().unwrap().clone().min().into_scalar() >= 0.0);
    }

    #[test]
    fn test_merged_decoder() {
        let device = Default::default();
        let model = small_config()
            .with_merged_decoder(true)
            .init::<TestBackend>(&device);
        assert!(model.normals_decoder.is_none());
        let out = model.forward(Tensor::zeros([1, 3, 8, 8], &device));
        assert_eq!(out.depth.len(), 3);
        assert_eq!(out.finest_depth().unwrap().dims(), [1, 1, 8, 8]);
        assert_eq!(out.normals.unwrap().dims(), [1, 3, 8, 8]);
    }

    #[test]
    fn test_normals_masked_below_min_depth() {
        let device = Default::default();
        let model = small_config()
            .with_min_depth(1e9)
            .init::<TestBackend>(&device);
        let out = model.forward(Tensor::ones([1, 3, 8, 8], &device));
        let normals = out.normals.unwrap();
        assert_eq!(normals.abs().max().into_scalar(), 0.0);
    }

    #[test]
    fn test_depth_only() {
        let device = Default::default();
        let model = small_config()
            .with_predict_normals(false)
            .init::<TestBackend>(&device);
        assert!(!model.predicts_normals());
        let out = model.forward(Tensor::zeros([1, 3, 8, 8], &device));
        assert!(out.normals.is_none());
    }
}
