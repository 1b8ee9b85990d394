//! Configuration types for cysto_depth.
//!
//! Burn-style configuration structs for rendering, data, the network and
//! training, plus the [`CystoDepthConfig`] bundle that ties them to data
//! directories and a split.

mod data;
mod experiment;
mod model;
mod phong;
mod training;

pub use data::{ColorJitterConfig, DataConfig};
pub use experiment::CystoDepthConfig;
pub use model::DepthModelConfig;
pub use phong::PhongConfig;
pub use training::{OptimizerKind, PlateauMode, TrainingConfig};
