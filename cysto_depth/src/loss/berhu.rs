//! Reverse Huber (BerHu) depth loss.
//!
//! ```text
//! berhu(d) = |d|                 if |d| <= c
//!            (d² + c²) / (2c)    otherwise
//! ```
//!
//! with `c = 0.2 · max|d|` over the batch, treated as a constant.

use burn::nn::pool::AvgPool2dConfig;
use burn::prelude::*;
use burn::tensor::ElementConversion;

const THRESHOLD_FRACTION: f32 = 0.2;
const MIN_THRESHOLD: f32 = 1e-6;

/// Mean BerHu loss between `pred` and `target` of equal shape.
pub fn berhu_loss<B: Backend>(pred: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 1> {
    let abs = (pred - target).abs();
    let max: f32 = abs.clone().detach().max().into_scalar().elem();
    let c = (THRESHOLD_FRACTION * max).max(MIN_THRESHOLD);

    let quadratic = (abs.clone().powf_scalar(2.0) + c * c).div_scalar(2.0 * c);
    let large = abs.clone().greater_elem(c);
    abs.mask_where(large, quadratic).mean()
}

/// Average-pool `target` down to the resolution of `like`.
///
/// The target side must be an integer multiple of the prediction side.
pub fn downsample_to<B: Backend>(target: Tensor<B, 4>, like: &Tensor<B, 4>) -> Tensor<B, 4> {
    let [_, _, th, tw] = target.dims();
    let [_, _, h, w] = like.dims();
    if (th, tw) == (h, w) || h == 0 || w == 0 {
        return target;
    }
    let (fy, fx) = ((th / h).max(1), (tw / w).max(1));
    AvgPool2dConfig::new([fy, fx])
        .with_strides([fy, fx])
        .init()
        .forward(target)
}

/// BerHu summed over every prediction scale; the target is average-pooled
/// to each scale.
pub fn multiscale_berhu<B: Backend>(predictions: &[Tensor<B, 4>], target: Tensor<B, 4>) -> Tensor<B, 1> {
    let device = target.device();
    predictions
        .iter()
        .fold(Tensor::zeros([1], &device), |acc, pred| {
            let scaled = downsample_to(target.clone(), pred);
            acc + berhu_loss(pred.clone(), scaled)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tensor(values: &[f32], shape: [usize; 4]) -> Tensor<TestBackend, 4> {
        Tensor::from_data(TensorData::new(values.to_vec(), shape), &Default::default())
    }

    #[test]
    fn test_identical_is_zero() {
        let t = tensor(&[1.0, 2.0, 3.0, 4.0], [1, 1, 2, 2]);
        let loss = berhu_loss(t.clone(), t);
        assert_eq!(loss.into_scalar(), 0.0);
    }

    #[test]
    fn test_piecewise_regions() {
        // diffs 0, 1, 10 with c = 2: 0, 1, (100 + 4) / 4 = 26
        let pred = tensor(&[0.0, 1.0, 10.0], [1, 1, 1, 3]);
        let target = tensor(&[0.0, 0.0, 0.0], [1, 1, 1, 3]);
        let loss = berhu_loss(pred, target).into_scalar();
        assert!((loss - 27.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_downsample_averages_blocks() {
        let target = tensor(&[1.0, 3.0, 5.0, 7.0], [1, 1, 2, 2]);
        let like = Tensor::<TestBackend, 4>::zeros([1, 1, 1, 1], &Default::default());
        let pooled = downsample_to(target, &like);
        assert_eq!(pooled.dims(), [1, 1, 1, 1]);
        assert!((pooled.into_scalar() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_multiscale_sums_scales() {
        let device = Default::default();
        let target = Tensor::<TestBackend, 4>::ones([1, 1, 4, 4], &device);
        let exact = vec![
            Tensor::ones([1, 1, 2, 2], &device),
            Tensor::ones([1, 1, 4, 4], &device),
        ];
        assert_eq!(multiscale_berhu(&exact, target.clone()).into_scalar(), 0.0);

        let off = vec![
            Tensor::zeros([1, 1, 2, 2], &device),
            Tensor::zeros([1, 1, 4, 4], &device),
        ];
        // every diff equals the max, so each scale contributes (1 + 0.04) / 0.4
        let loss = multiscale_berhu(&off, target).into_scalar();
        assert!((loss - 2.0 * 2.6).abs() < 1e-4);
    }
}
