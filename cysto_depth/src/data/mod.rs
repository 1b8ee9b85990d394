//! Datasets, augmentation and batch loading.
//!
//! Samples are lists of CHW [`cysto_core::Image`] channels whose roles are
//! given by a [`ChannelRole`] layout. Per-sample randomness comes from a
//! [`SampleRng`] keyed by epoch and index, so loads are reproducible no
//! matter which worker runs them.

mod batcher;
mod dataset;
mod loader;
mod module;
mod pipeline;
mod rng;
mod sync;
mod transforms;

pub use batcher::{DepthBatch, DepthBatcher};
pub use dataset::{ChannelRole, ImageDataset, PhongDataset, Sample, SampleSource};
pub use loader::{BatchIter, BatchLoader};
pub use module::{DataModule, DepthDataModule, PhongDataModule};
pub use pipeline::Pipeline;
pub use rng::SampleRng;
pub use sync::{
    AffineArgs, EndoMask, MaskFill, OnChannel, RandomAffine, SampleTransform, SyncTransform,
    Synchronized,
};
pub use transforms::{ChannelSlice, ColorJitter, ElementWiseScale, Squarify, Transform, UnitToSigned};
