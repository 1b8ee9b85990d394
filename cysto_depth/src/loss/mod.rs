//! Loss functions for depth and normals estimation.
//!
//! - BerHu on depth, summed over every decoder scale
//! - Gradient matching on the finest depth, from the second epoch on
//! - Cosine similarity and unit-length regularization on normals
//! - Photometric L1 through the Phong renderer
//!
//! [`DepthLoss`] combines them with the factors of
//! [`crate::config::TrainingConfig`].

mod berhu;
mod gradient;
mod normal;
mod phong;

use burn::prelude::*;

pub use berhu::{berhu_loss, downsample_to, multiscale_berhu};
pub use gradient::{gradient_loss, spatial_gradients};
pub use normal::{channel_norm, cosine_normal_loss, normal_norm_regularization};
pub use phong::PhongLoss;

use crate::config::TrainingConfig;
use crate::convert::to_scalar;
use crate::data::DepthBatch;
use crate::error::{CystoDepthError, Result};
use crate::nn::DepthOutput;

/// Factor of each loss term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossWeights {
    /// BerHu depth loss.
    pub depth: f32,
    /// Depth gradient loss.
    pub gradient: f32,
    /// Normals cosine loss.
    pub normals: f32,
    /// Normals unit-length regularization.
    pub regularization: f32,
    /// Photometric loss.
    pub phong: f32,
}

impl LossWeights {
    /// Weights from the training configuration.
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            depth: config.depth_loss_factor,
            gradient: config.depth_grad_loss_factor,
            normals: config.normals_loss_factor,
            regularization: config.normals_regularization_factor,
            phong: config.phong_loss_factor,
        }
    }
}

impl Default for LossWeights {
    fn default() -> Self {
        Self::from_config(&TrainingConfig::default())
    }
}

/// Every computed term plus the weighted total.
#[derive(Debug, Clone)]
pub struct LossTerms<B: Backend> {
    /// BerHu summed over scales.
    pub depth: Tensor<B, 1>,
    /// Gradient loss; exactly zero in epoch 0.
    pub gradient: Tensor<B, 1>,
    /// Normals cosine loss, when normals are predicted.
    pub normals: Option<Tensor<B, 1>>,
    /// Normals regularization, when normals are predicted.
    pub regularization: Option<Tensor<B, 1>>,
    /// Photometric loss, when normals are predicted and a renderer is set.
    pub phong: Option<Tensor<B, 1>>,
    /// Weighted sum of the terms with a non-zero factor.
    pub total: Tensor<B, 1>,
}

impl<B: Backend> LossTerms<B> {
    /// Named scalar values of every present term, for logging.
    ///
    /// # Errors
    /// Returns [`CystoDepthError::Data`] if a value cannot be read back.
    pub fn scalars(&self) -> Result<Vec<(&'static str, f32)>> {
        let mut out = vec![
            ("depth_berhu_loss", to_scalar(self.depth.clone())?),
            ("depth_gradient_loss", to_scalar(self.gradient.clone())?),
        ];
        let optional = [
            ("normals_cosine_similarity_loss", &self.normals),
            ("normals_regularized_loss", &self.regularization),
            ("phong_loss", &self.phong),
        ];
        for (name, term) in optional {
            if let Some(t) = term {
                out.push((name, to_scalar(t.clone())?));
            }
        }
        out.push(("training_loss", to_scalar(self.total.clone())?));
        Ok(out)
    }
}

/// The combined training objective.
#[derive(Debug, Clone)]
pub struct DepthLoss<B: Backend> {
    weights: LossWeights,
    phong: Option<PhongLoss<B>>,
}

impl<B: Backend> DepthLoss<B> {
    /// Combine terms with `weights`; without `phong` the photometric term is
    /// never computed.
    pub fn new(weights: LossWeights, phong: Option<PhongLoss<B>>) -> Self {
        Self { weights, phong }
    }

    /// The weights in use.
    pub fn weights(&self) -> LossWeights {
        self.weights
    }

    /// The photometric loss, if configured.
    pub fn phong(&self) -> Option<&PhongLoss<B>> {
        self.phong.as_ref()
    }

    /// Compute every term for one batch.
    ///
    /// # Errors
    /// Returns [`CystoDepthError::ChannelArity`] if the batch lacks depth,
    /// or lacks normals or shading while the network predicts normals.
    pub fn compute(&self, output: &DepthOutput<B>, batch: &DepthBatch<B>, epoch: usize) -> Result<LossTerms<B>> {
        let target = batch.require_depth("depth loss")?;
        let fine = output
            .finest_depth()
            .ok_or_else(|| CystoDepthError::config("network produced no depth scales"))?;

        let depth = multiscale_berhu(&output.depth, target.clone());
        let gradient = gradient_loss(fine.clone(), target, epoch);

        let (mut normals, mut regularization, mut phong) = (None, None, None);
        if let Some(pred_normals) = &output.normals {
            let gt_normals = batch.require_normals("normals loss with predicted normals")?;
            normals = Some(cosine_normal_loss(pred_normals.clone(), gt_normals));
            regularization = Some(normal_norm_regularization(pred_normals.clone()));
            if let Some(loss) = &self.phong {
                let gt_phong = batch.require_phong("phong loss with predicted normals")?;
                phong = Some(loss.forward(fine.clone(), pred_normals.clone(), gt_phong).0);
            }
        }

        let w = self.weights;
        let weighted = [
            (Some(&depth), w.depth),
            (Some(&gradient), w.gradient),
            (normals.as_ref(), w.normals),
            (regularization.as_ref(), w.regularization),
            (phong.as_ref(), w.phong),
        ];
        let total = weighted
            .into_iter()
            .filter(|(_, factor)| *factor != 0.0)
            .filter_map(|(term, factor)| term.map(|t| t.clone().mul_scalar(factor)))
            .fold(Tensor::zeros([1], &depth.device()), |acc, t| acc + t);

        Ok(LossTerms {
            depth,
            gradient,
            normals,
            regularization,
            phong,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn batch(depth: f32, normals: bool) -> DepthBatch<TestBackend> {
        let device = Default::default();
        DepthBatch {
            color: Tensor::zeros([1, 3, 4, 4], &device),
            phong: None,
            depth: Some(Tensor::full([1, 1, 4, 4], depth, &device)),
            normals: normals.then(|| {
                Tensor::from_data(
                    TensorData::new([[0.0f32; 16], [0.0; 16], [1.0; 16]].concat(), [1, 3, 4, 4]),
                    &device,
                )
            }),
            indices: vec![0],
        }
    }

    fn output(depth: f32, normals: bool) -> DepthOutput<TestBackend> {
        let b = batch(depth, normals);
        DepthOutput {
            depth: vec![
                Tensor::full([1, 1, 2, 2], depth, &Default::default()),
                b.depth.clone().unwrap(),
            ],
            normals: b.normals,
        }
    }

    #[test]
    fn test_perfect_prediction_is_zero() {
        let loss = DepthLoss::<TestBackend>::new(LossWeights::default(), None);
        let terms = loss.compute(&output(3.0, true), &batch(3.0, true), 2).unwrap();
        assert!(terms.total.into_scalar().abs() < 1e-5);
        assert!(terms.phong.is_none());
    }

    #[test]
    fn test_scalars_and_weights() {
        let weights = LossWeights {
            depth: 2.0,
            gradient: 0.0,
            normals: 0.0,
            regularization: 0.0,
            phong: 0.0,
        };
        let loss = DepthLoss::<TestBackend>::new(weights, None);
        // every diff is 1 with c = 0.2: (1 + 0.04) / 0.4 per scale
        let terms = loss.compute(&output(0.0, false), &batch(1.0, false), 0).unwrap();
        let scalars = terms.scalars().unwrap();
        let names: Vec<_> = scalars.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["depth_berhu_loss", "depth_gradient_loss", "training_loss"]);
        assert!((scalars[0].1 - 5.2).abs() < 1e-4);
        assert_eq!(scalars[1].1, 0.0);
        assert!((scalars[2].1 - 10.4).abs() < 1e-3);
    }

    #[test]
    fn test_predicted_normals_need_ground_truth() {
        let loss = DepthLoss::<TestBackend>::new(LossWeights::default(), None);
        let err = loss.compute(&output(1.0, true), &batch(1.0, false), 0).unwrap_err();
        assert!(matches!(err, CystoDepthError::ChannelArity { channel: "normals", .. }));
    }
}
