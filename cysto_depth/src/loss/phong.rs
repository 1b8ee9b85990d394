//! Photometric loss through the differentiable renderer.

use burn::prelude::*;

use crate::render::PhongRenderer;

/// L1 distance between the shading rendered from predicted depth and
/// normals and the ground-truth shading.
///
/// The ground truth is rendered from raw depth at load time; predictions
/// live in the scaled unit, so they are divided by `depth_scale` first.
#[derive(Debug, Clone)]
pub struct PhongLoss<B: Backend> {
    renderer: PhongRenderer<B>,
    depth_scale: f32,
}

impl<B: Backend> PhongLoss<B> {
    /// Create a loss around `renderer`.
    pub fn new(renderer: PhongRenderer<B>, depth_scale: f32) -> Self {
        Self {
            renderer,
            depth_scale,
        }
    }

    /// The renderer in use.
    pub fn renderer(&self) -> &PhongRenderer<B> {
        &self.renderer
    }

    /// Render predictions without comparing them.
    pub fn render(&self, depth: Tensor<B, 4>, normals: Tensor<B, 4>) -> Tensor<B, 4> {
        self.renderer
            .render(depth.div_scalar(self.depth_scale), normals)
    }

    /// Loss and the rendered prediction.
    pub fn forward(
        &self,
        depth: Tensor<B, 4>,
        normals: Tensor<B, 4>,
        target: Tensor<B, 4>,
    ) -> (Tensor<B, 1>, Tensor<B, 4>) {
        let rendered = self.render(depth, normals);
        let loss = (rendered.clone() - target).abs().mean();
        (loss, rendered)
    }
}
