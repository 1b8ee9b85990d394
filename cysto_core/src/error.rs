//! Error types for cysto_core operations.
//!
//! A plain enum with no external dependencies so the crate stays `no_std`.

use core::fmt;

/// Errors that can occur while manipulating image buffers and camera models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoreError {
    /// The backing buffer does not hold `channels * height * width` values.
    BufferSizeMismatch {
        /// Number of values implied by the shape.
        expected: usize,
        /// Number of values provided.
        got: usize,
    },
    /// The operation requires a specific number of channels.
    ChannelCountMismatch {
        /// Channels the operation needs.
        expected: usize,
        /// Channels the image has.
        got: usize,
    },
    /// A channel index is past the end of the image.
    ChannelOutOfRange {
        /// Requested channel.
        index: usize,
        /// Channels the image has.
        channels: usize,
    },
    /// A per-channel fill does not match the channel count (and is not a single value).
    FillLengthMismatch {
        /// Channels the image has.
        channels: usize,
        /// Length of the fill slice.
        got: usize,
    },
    /// Two images that must share a spatial extent do not.
    SizeMismatch {
        /// Height and width of the first image.
        expected: (usize, usize),
        /// Height and width of the second image.
        got: (usize, usize),
    },
    /// The image has no pixels.
    EmptyImage,
    /// The intrinsics matrix cannot be inverted or is malformed.
    InvalidIntrinsics {
        /// What is wrong with it.
        reason: &'static str,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::BufferSizeMismatch { expected, got } => {
                write!(f, "buffer holds {} values but shape needs {}", got, expected)
            }
            CoreError::ChannelCountMismatch { expected, got } => {
                write!(f, "expected {} channels, got {}", expected, got)
            }
            CoreError::ChannelOutOfRange { index, channels } => {
                write!(f, "channel {} out of range for {} channels", index, channels)
            }
            CoreError::FillLengthMismatch { channels, got } => {
                write!(
                    f,
                    "fill has {} values but image has {} channels",
                    got, channels
                )
            }
            CoreError::SizeMismatch { expected, got } => {
                write!(
                    f,
                    "image size {}x{} does not match {}x{}",
                    got.0, got.1, expected.0, expected.1
                )
            }
            CoreError::EmptyImage => write!(f, "image has no pixels"),
            CoreError::InvalidIntrinsics { reason } => {
                write!(f, "invalid camera intrinsics: {}", reason)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "std")]
    #[test]
    fn test_error_display() {
        use std::format;

        let err = CoreError::BufferSizeMismatch {
            expected: 12,
            got: 10,
        };
        assert_eq!(format!("{}", err), "buffer holds 10 values but shape needs 12");

        let err = CoreError::ChannelOutOfRange {
            index: 3,
            channels: 3,
        };
        assert_eq!(format!("{}", err), "channel 3 out of range for 3 channels");

        let err = CoreError::InvalidIntrinsics {
            reason: "zero focal length",
        };
        assert_eq!(
            format!("{}", err),
            "invalid camera intrinsics: zero focal length"
        );
    }

    #[test]
    fn test_error_equality() {
        let a = CoreError::ChannelCountMismatch {
            expected: 3,
            got: 1,
        };
        let b = CoreError::ChannelCountMismatch {
            expected: 3,
            got: 1,
        };
        assert_eq!(a, b);
        assert_ne!(a, CoreError::EmptyImage);
    }
}
