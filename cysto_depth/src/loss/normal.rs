//! Surface-normal losses.

use burn::prelude::*;

const COSINE_EPS: f32 = 1e-8;
const NORM_EPS: f32 = 1e-12;

/// Per-pixel L2 norm over the channel axis: `[B, C, H, W] -> [B, 1, H, W]`.
pub fn channel_norm<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    x.powf_scalar(2.0).sum_dim(1).add_scalar(NORM_EPS).sqrt()
}

/// Cosine loss: `1 - mean(pred · target / max(|pred| |target|, eps))`.
///
/// Both inputs are `[batch, 3, H, W]`.
pub fn cosine_normal_loss<B: Backend>(pred: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 1> {
    let dot = (pred.clone() * target.clone()).sum_dim(1);
    let denom = (channel_norm(pred) * channel_norm(target)).clamp_min(COSINE_EPS);
    let cos_sim = dot / denom;
    cos_sim.mean().neg().add_scalar(1.0)
}

/// Mean squared deviation of the per-pixel normal length from one.
pub fn normal_norm_regularization<B: Backend>(pred: Tensor<B, 4>) -> Tensor<B, 1> {
    channel_norm(pred).sub_scalar(1.0).powf_scalar(2.0).mean()
}
