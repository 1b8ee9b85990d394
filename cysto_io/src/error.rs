//! Error types for cysto_io operations.
//!
//! Covers directory discovery, split construction, manifest persistence and
//! image decoding.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during cysto_io operations.
#[derive(Error, Debug)]
pub enum CystoIoError {
    /// Filesystem access failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An image file could not be decoded or encoded.
    #[error("image error at {path}: {source}")]
    Image {
        /// Path of the image.
        path: PathBuf,
        /// Underlying codec error.
        #[source]
        source: image::ImageError,
    },

    /// Manifest (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A split regex failed to compile.
    #[error("invalid split regex: {0}")]
    Regex(#[from] regex::Error),

    /// Modality directories hold different numbers of files.
    #[error("modality {modality} has {got} files but {reference} has {expected}")]
    ModalityCountMismatch {
        /// Modality used as reference (the first one).
        reference: String,
        /// File count of the reference.
        expected: usize,
        /// Offending modality.
        modality: String,
        /// File count of the offending modality.
        got: usize,
    },

    /// A regex matched the path of some, but not all, modalities of a sample.
    #[error("regex {regex:?} for stage {stage} matches {path} but not its paired files")]
    InconsistentRegexMatch {
        /// Stage the regex belongs to.
        stage: String,
        /// Offending pattern.
        regex: String,
        /// First modality path that matched.
        path: PathBuf,
    },

    /// A stage name is not one of `train`, `validate`, `test`.
    #[error("unknown stage: {0}")]
    UnknownStage(String),

    /// A modality name is not one of `color`, `depth`, `normals`.
    #[error("unknown modality: {0}")]
    UnknownModality(String),

    /// The manifest lacks a modality the caller needs.
    #[error("manifest has no {modality} files for stage {stage}")]
    MissingModality {
        /// Requested modality.
        modality: String,
        /// Requested stage.
        stage: String,
    },

    /// A file is assigned to more than one stage.
    #[error("{path} is assigned to both {first} and {second}")]
    OverlappingStages {
        /// Shared file.
        path: PathBuf,
        /// First stage holding it.
        first: String,
        /// Second stage holding it.
        second: String,
    },

    /// A decoded image could not be converted into a buffer.
    #[error("image buffer error: {0}")]
    Core(#[from] cysto_core::CoreError),
}

impl CystoIoError {
    /// Wrap an I/O error with the path it happened at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for cysto_io operations.
pub type Result<T> = std::result::Result<T, CystoIoError>;
