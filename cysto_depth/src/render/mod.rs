//! Differentiable Phong rendering.
//!
//! The renderer produces the ground-truth shading at load time and
//! re-renders predicted depth and normals inside the loss.

mod phong;
mod pixels;

pub use phong::{render_rgbd, Material, PhongRenderer, PointLight};
pub use pixels::PixelRays;
