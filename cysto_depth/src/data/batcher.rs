//! Collation of samples into batch tensors.

use burn::prelude::*;
use cysto_core::Image;

use super::dataset::{ChannelRole, Sample};
use crate::error::{CystoDepthError, Result};

/// A batch of aligned images as `[N, C, H, W]` tensors.
#[derive(Debug, Clone)]
pub struct DepthBatch<B: Backend> {
    /// Input colour images.
    pub color: Tensor<B, 4>,
    /// Ground-truth Phong shading, if the source provides it.
    pub phong: Option<Tensor<B, 4>>,
    /// Ground-truth depth, if the source provides it.
    pub depth: Option<Tensor<B, 4>>,
    /// Ground-truth normals, if the source provides it.
    pub normals: Option<Tensor<B, 4>>,
    /// Source indices of the samples, in batch order.
    pub indices: Vec<usize>,
}

impl<B: Backend> DepthBatch<B> {
    /// Number of samples.
    pub fn len(&self) -> usize {
        self.color.dims()[0]
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Device of the batch.
    pub fn device(&self) -> B::Device {
        self.color.device()
    }

    /// Ground-truth depth or a [`CystoDepthError::ChannelArity`] error
    /// naming `context`.
    pub fn require_depth(&self, context: &str) -> Result<Tensor<B, 4>> {
        self.depth
            .clone()
            .ok_or_else(|| CystoDepthError::missing("depth", context))
    }

    /// Ground-truth normals or a [`CystoDepthError::ChannelArity`] error.
    pub fn require_normals(&self, context: &str) -> Result<Tensor<B, 4>> {
        self.normals
            .clone()
            .ok_or_else(|| CystoDepthError::missing("normals", context))
    }

    /// Ground-truth shading or a [`CystoDepthError::ChannelArity`] error.
    pub fn require_phong(&self, context: &str) -> Result<Tensor<B, 4>> {
        self.phong
            .clone()
            .ok_or_else(|| CystoDepthError::missing("phong", context))
    }
}

/// Stacks samples that follow a fixed channel layout.
#[derive(Debug, Clone)]
pub struct DepthBatcher {
    layout: Vec<ChannelRole>,
}

impl DepthBatcher {
    /// Batcher for samples with `layout`.
    pub fn new(layout: &[ChannelRole]) -> Self {
        Self {
            layout: layout.to_vec(),
        }
    }

    fn stack<B: Backend>(
        samples: &[Sample],
        slot: usize,
        device: &B::Device,
    ) -> Result<Tensor<B, 4>> {
        let first: &Image = &samples[0].channels[slot];
        let shape = first.shape();
        let mut data = Vec::with_capacity(samples.len() * first.data().len());
        for sample in samples {
            let image = &sample.channels[slot];
            if image.shape() != shape {
                return Err(CystoDepthError::ShapeMismatch {
                    expected: shape.to_vec(),
                    got: image.shape().to_vec(),
                });
            }
            data.extend_from_slice(image.data());
        }
        let [c, h, w] = shape;
        Ok(Tensor::from_data(
            TensorData::new(data, [samples.len(), c, h, w]),
            device,
        ))
    }

    /// Stack `samples` into a batch on `device`.
    ///
    /// # Errors
    /// Returns [`CystoDepthError::Data`] for an empty batch,
    /// [`CystoDepthError::SyncArity`] if a sample does not follow the layout,
    /// [`CystoDepthError::ChannelArity`] if the layout has no colour channel
    /// and [`CystoDepthError::ShapeMismatch`] if images of one role differ in
    /// shape.
    pub fn batch<B: Backend>(&self, samples: Vec<Sample>, device: &B::Device) -> Result<DepthBatch<B>> {
        if samples.is_empty() {
            return Err(CystoDepthError::Data("cannot batch zero samples".to_string()));
        }
        if let Some(bad) = samples.iter().find(|s| s.channels.len() != self.layout.len()) {
            return Err(CystoDepthError::SyncArity {
                expected: self.layout.len(),
                got: bad.channels.len(),
            });
        }
        let slot = |role: ChannelRole| self.layout.iter().position(|r| *r == role);
        let stack_role = |role: ChannelRole| -> Result<Option<Tensor<B, 4>>> {
            slot(role)
                .map(|i| Self::stack::<B>(&samples, i, device))
                .transpose()
        };

        let color = stack_role(ChannelRole::Color)?
            .ok_or_else(|| CystoDepthError::missing("color", "batch layout"))?;
        Ok(DepthBatch {
            color,
            phong: stack_role(ChannelRole::Phong)?,
            depth: stack_role(ChannelRole::Depth)?,
            normals: stack_role(ChannelRole::Normals)?,
            indices: samples.iter().map(|s| s.index).collect(),
        })
    }
}
