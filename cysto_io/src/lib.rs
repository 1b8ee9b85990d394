//! cysto_io - filesystem layer for the cystoscopy depth pipeline.
//!
//! This crate finds the images of every modality on disk, splits them into
//! train/validate/test stages, persists that split, and decodes image files
//! into [`cysto_core::Image`] buffers.
//!
//! # Core Types
//!
//! - [`DataDirs`]: root directory per [`Modality`]
//! - [`ModalityFiles`]: sorted, paired file lists from recursive discovery
//! - [`SplitSpec`] / [`SplitSource`]: how stages pick their files
//! - [`SplitBuilder`]: discovery plus partition into a [`SplitManifest`]
//! - [`SplitManifest`]: stage -> modality -> files, saved as JSON
//!
//! # Example
//!
//! ```ignore
//! use cysto_io::{DataDirs, SplitBuilder, SplitSpec, Stage};
//!
//! let dirs = DataDirs::new("/data/color", "/data/depth").with_normals("/data/normals");
//! let spec = SplitSpec::new()
//!     .with_regex(Stage::Test, ".*model_01.*")
//!     .with_ratio(Stage::Train, 0.75)
//!     .with_ratio(Stage::Validate, 0.25);
//! let manifest = SplitBuilder::new(dirs).with_seed(42).build(&spec.into())?;
//! manifest.save("/runs/exp1/split.json")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod config;
pub mod discovery;
pub mod error;
pub mod manifest;
pub mod split;

pub use codec::{load_image, save_exr, save_image};
pub use config::{DataDirs, Modality};
pub use discovery::{is_os_metadata, list_files, ModalityFiles};
pub use error::{CystoIoError, Result};
pub use manifest::SplitManifest;
pub use split::{
    partition, regexes_matching_roots, RatioRounding, SplitBuilder, SplitSource, SplitSpec, Stage,
    StageIndices, StageSpec,
};
