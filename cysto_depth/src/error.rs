//! Error types for cysto_depth.

use thiserror::Error;

/// Errors that can occur while loading data, training or checkpointing.
#[derive(Error, Debug)]
pub enum CystoDepthError {
    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// A sample or batch lacks a channel the current mode needs.
    #[error("missing {channel} channel: {context}")]
    ChannelArity {
        /// Name of the missing channel.
        channel: &'static str,
        /// What needed it.
        context: String,
    },

    /// A synchronized transform received the wrong number of channels.
    #[error("synchronized transform expects {expected} channels, got {got}")]
    SyncArity {
        /// Channels the transform was built for.
        expected: usize,
        /// Channels it was called with.
        got: usize,
    },

    /// Tensor shape mismatch.
    #[error("tensor shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        got: Vec<usize>,
    },

    /// Checkpoint directory is incomplete or inconsistent.
    #[error("checkpoint error: {message}")]
    Checkpoint {
        /// Description of the error.
        message: String,
    },

    /// Model record could not be written or read.
    #[error("recorder error: {0}")]
    Recorder(#[from] burn::record::RecorderError),

    /// Tensor data could not be read back to the host.
    #[error("tensor data error: {0}")]
    Data(String),

    /// Filesystem, split or codec error from cysto_io.
    #[error("I/O error: {0}")]
    Io(#[from] cysto_io::CystoIoError),

    /// Image buffer error from cysto_core.
    #[error("image error: {0}")]
    Image(#[from] cysto_core::CoreError),

    /// Plain filesystem error outside cysto_io.
    #[error("filesystem error: {0}")]
    Fs(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Worker pool could not be created.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl CystoDepthError {
    /// Shorthand for [`CystoDepthError::InvalidConfig`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Shorthand for [`CystoDepthError::ChannelArity`].
    pub fn missing(channel: &'static str, context: impl Into<String>) -> Self {
        Self::ChannelArity {
            channel,
            context: context.into(),
        }
    }
}

/// Result type for cysto_depth operations.
pub type Result<T> = std::result::Result<T, CystoDepthError>;
