//! Network modules.
//!
//! - [`Encoder`]: convolutional encoder producing per-level skip features
//! - [`Decoder`]: multi-scale decoder with skip connections
//! - [`DepthNormalModel`]: the full depth/normals network

mod blocks;
mod decoder;
mod encoder;
mod model;

pub use blocks::{ConvBlock, ConvBlockConfig};
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use model::{DepthNormalModel, DepthOutput};
