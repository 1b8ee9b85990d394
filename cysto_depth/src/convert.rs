//! Conversions between host [`Image`] buffers and burn tensors.

use burn::prelude::*;
use cysto_core::Image;

use crate::error::{CystoDepthError, Result};

/// Upload a CHW image as a `[C, H, W]` tensor.
pub fn image_to_tensor<B: Backend>(image: &Image, device: &B::Device) -> Tensor<B, 3> {
    Tensor::from_data(TensorData::new(image.data().to_vec(), image.shape()), device)
}

/// Read a `[C, H, W]` tensor back into an image.
///
/// # Errors
/// Returns [`CystoDepthError::Data`] if the tensor cannot be read.
pub fn tensor_to_image<B: Backend>(tensor: Tensor<B, 3>) -> Result<Image> {
    let [c, h, w] = tensor.dims();
    let data = to_vec(tensor)?;
    Ok(Image::new(c, h, w, data)?)
}

/// Split a `[B, C, H, W]` batch into `B` images.
///
/// # Errors
/// Returns [`CystoDepthError::Data`] if the tensor cannot be read.
pub fn batch_to_images<B: Backend>(batch: Tensor<B, 4>) -> Result<Vec<Image>> {
    let [b, c, h, w] = batch.dims();
    let data = to_vec(batch)?;
    let stride = c * h * w;
    (0..b)
        .map(|i| Ok(Image::new(c, h, w, data[i * stride..(i + 1) * stride].to_vec())?))
        .collect()
}

/// Read any tensor back as a flat vector.
///
/// # Errors
/// Returns [`CystoDepthError::Data`] if the tensor cannot be read.
pub fn to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| CystoDepthError::Data(format!("{e:?}")))
}

/// Read a single-element tensor as a scalar.
///
/// # Errors
/// Returns [`CystoDepthError::Data`] if the tensor is empty or unreadable.
pub fn to_scalar<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<f32> {
    to_vec(tensor)?
        .first()
        .copied()
        .ok_or_else(|| CystoDepthError::Data("empty tensor".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_image_tensor_roundtrip() {
        let device = Default::default();
        let img = Image::from_fn(2, 3, 4, |c, y, x| (c * 100 + y * 10 + x) as f32);
        let t = image_to_tensor::<TestBackend>(&img, &device);
        assert_eq!(t.dims(), [2, 3, 4]);
        assert_eq!(tensor_to_image(t).unwrap(), img);
    }

    #[test]
    fn test_batch_split() {
        let device = Default::default();
        let t = Tensor::<TestBackend, 1, Int>::arange(0..24, &device)
            .float()
            .reshape([2, 3, 2, 2]);
        let images = batch_to_images(t).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[1].shape(), [3, 2, 2]);
        assert_eq!(images[1].get(0, 0, 0), 12.0);
    }

    #[test]
    fn test_scalar() {
        let device = Default::default();
        let t = Tensor::<TestBackend, 1>::from_floats([2.5, 1.0], &device);
        assert_eq!(to_scalar(t).unwrap(), 2.5);
    }
}
