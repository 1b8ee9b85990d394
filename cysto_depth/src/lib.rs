//! # cysto_depth
//!
//! Joint depth and surface-normal estimation for endoscopic imagery, trained
//! with Burn and supervised through a differentiable Phong renderer.
//!
//! This crate builds on cysto_core (image math) and cysto_io (file
//! discovery, splits, codecs) to provide the data pipeline, the network,
//! the losses and the training loop.
//!
//! ## Features
//!
//! - **Data pipeline**: seeded per-sample augmentation, transforms that
//!   draw once and apply to every channel, parallel batch loading
//! - **Phong renderer**: point light, constant albedo, pure tensor math that
//!   is differentiable with respect to depth and normals
//! - **Network**: convolutional encoder with a merged or separate normals
//!   decoder and multi-scale depth output
//! - **Losses**: multi-scale BerHu, gradient matching, cosine normals,
//!   unit-length regularization and photometric L1
//! - **Training**: gradient accumulation, warmup then reduce-on-plateau,
//!   non-strict checkpoint resume, depth metrics and comparison figures
//!
//! ## Quick Start
//!
//! ```ignore
//! use burn::backend::{Autodiff, NdArray};
//! use cysto_depth::prelude::*;
//!
//! type MyBackend = Autodiff<NdArray>;
//!
//! let config = CystoDepthConfig::load("experiment.json")?;
//! config.validate()?;
//! let device = Default::default();
//!
//! let data = PhongDataModule::<NdArray>::from_config(&config, device)?;
//! let mut task = DepthEstimationTask::<MyBackend>::from_config(&config, &device)?;
//! let trainer = Trainer::<MyBackend>::new(config.training.clone(), config.model.clone(), device);
//! let outcome = trainer.fit(&mut task, &data, &mut LogSink)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! cysto_core (pure image math)
//!     │
//!     ├──────────────────┐
//!     ▼                  ▼
//! cysto_io          cysto_depth
//! (files, splits)   (data, render, nn, loss, training)
//!     │                  ▲
//!     └──────────────────┘
//!          decoded images
//! ```
//!
//! ## Feature Flags
//!
//! - `ndarray` (default): CPU backend for tests and the example binary

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod convert;
pub mod data;
pub mod error;
pub mod loss;
pub mod nn;
pub mod render;
pub mod training;

// Re-export key types for convenience
pub use config::{CystoDepthConfig, DataConfig, DepthModelConfig, PhongConfig, TrainingConfig};
pub use error::{CystoDepthError, Result};
pub use loss::DepthLoss;
pub use nn::DepthNormalModel;
pub use render::PhongRenderer;
pub use training::{DepthEstimationTask, Trainer};

// Re-export from cysto_core and cysto_io for convenience
pub use cysto_core::Image;
pub use cysto_io::{SplitManifest, Stage};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{
        ColorJitterConfig, CystoDepthConfig, DataConfig, DepthModelConfig, OptimizerKind,
        PhongConfig, PlateauMode, TrainingConfig,
    };
    pub use crate::data::{
        BatchLoader, ChannelRole, DataModule, DepthBatch, DepthDataModule, ImageDataset,
        PhongDataModule, PhongDataset, Pipeline, Sample, SampleRng, SampleSource,
    };
    pub use crate::error::{CystoDepthError, Result};
    pub use crate::loss::{DepthLoss, LossTerms, LossWeights, PhongLoss};
    pub use crate::nn::{DepthNormalModel, DepthOutput};
    pub use crate::render::{render_rgbd, Material, PhongRenderer, PixelRays, PointLight};
    pub use crate::training::{
        load_checkpoint, load_partial, save_checkpoint, DepthEstimationTask, FigureDirSink,
        LogSink, MemorySink, MetricsSink, OptimizerSpec, Trainable, Trainer,
    };

    pub use cysto_core::{CameraIntrinsics, Image};
    pub use cysto_io::{DataDirs, SplitManifest, SplitSource, SplitSpec, Stage};
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn test_public_api() {
        let _config = TrainingConfig::default();
        let _phong = PhongConfig::default();
        let config = CystoDepthConfig::new("/data/color".into(), "/data/depth".into())
            .with_normals_dir(Some("/data/normals".into()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_task_follows_experiment() {
        let device = Default::default();
        let with_normals = CystoDepthConfig::new("/c".into(), "/d".into())
            .with_normals_dir(Some("/n".into()));
        let task = DepthEstimationTask::<TestBackend>::from_config(&with_normals, &device).unwrap();
        assert!(task.loss().phong().is_some());

        let depth_only = CystoDepthConfig::new("/c".into(), "/d".into());
        let task = DepthEstimationTask::<TestBackend>::from_config(&depth_only, &device).unwrap();
        assert!(task.loss().phong().is_none());
    }
}
