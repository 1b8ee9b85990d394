//! Image-gradient matching loss on depth.

use burn::prelude::*;

/// Horizontal and vertical forward differences of a `[B, C, H, W]` map:
/// `([B, C, H, W-1], [B, C, H-1, W])`.
pub fn spatial_gradients<B: Backend>(x: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
    let [_, _, h, w] = x.dims();
    let dx = x.clone().narrow(3, 1, w - 1) - x.clone().narrow(3, 0, w - 1);
    let dy = x.clone().narrow(2, 1, h - 1) - x.narrow(2, 0, h - 1);
    (dx, dy)
}

/// Mean absolute difference between the spatial gradients of `pred` and
/// `target`.
///
/// Returns exactly zero (and contributes no gradient) while `epoch == 0`,
/// so early training is driven by the pointwise terms only.
pub fn gradient_loss<B: Backend>(pred: Tensor<B, 4>, target: Tensor<B, 4>, epoch: usize) -> Tensor<B, 1> {
    let [_, _, h, w] = pred.dims();
    if epoch == 0 || h < 2 || w < 2 {
        return Tensor::zeros([1], &pred.device());
    }
    let (pdx, pdy) = spatial_gradients(pred);
    let (tdx, tdy) = spatial_gradients(target);
    (pdx - tdx).abs().mean() + (pdy - tdy).abs().mean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray;

    fn ramp(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 4> {
        let values: Vec<f32> = (0..9).map(|i| (i % 3) as f32).collect();
        Tensor::from_data(TensorData::new(values, [1, 1, 3, 3]), device)
    }

    #[test]
    fn test_gradients_of_ramp() {
        let device = Default::default();
        let (dx, dy) = spatial_gradients(ramp(&device));
        assert_eq!(dx.dims(), [1, 1, 3, 2]);
        assert_eq!(dy.dims(), [1, 1, 2, 3]);
        assert_eq!(dx.min().into_scalar(), 1.0);
        assert_eq!(dy.abs().max().into_scalar(), 0.0);
    }

    #[test]
    fn test_gated_on_first_epoch() {
        let device = Default::default();
        let pred = Tensor::<TestBackend, 4>::zeros([1, 1, 3, 3], &device);
        assert_eq!(gradient_loss(pred.clone(), ramp(&device), 0).into_scalar(), 0.0);
        // |0 - 1| on every horizontal difference
        assert_eq!(gradient_loss(pred, ramp(&device), 1).into_scalar(), 1.0);
    }

    #[test]
    fn test_constant_offset_is_free() {
        let device = Default::default();
        let shifted = ramp(&device).add_scalar(5.0);
        assert_eq!(gradient_loss(shifted, ramp(&device), 3).into_scalar(), 0.0);
    }

    #[test]
    fn test_no_gradient_when_gated() {
        type AB = Autodiff<TestBackend>;
        let device = Default::default();
        let pred = Tensor::<AB, 4>::ones([1, 1, 3, 3], &device).require_grad();
        let target = Tensor::<AB, 4>::zeros([1, 1, 3, 3], &device);
        let loss = gradient_loss(pred.clone(), target, 0) + pred.clone().sum().mul_scalar(0.0);
        let grads = loss.backward();
        let grad = pred.grad(&grads).unwrap();
        assert_eq!(grad.abs().max().into_scalar(), 0.0);
    }
}
