//! Channel-major float image buffer.
//!
//! Every modality of a sample (colour, rendered Phong image, depth, normals)
//! is held as an [`Image`]: `channels` planes of `height * width` values laid
//! out one after the other (CHW order), the same order the tensors use.

use alloc::vec::Vec;

use crate::error::CoreError;
use crate::types::ImageSize;

/// A CHW float image.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl Image {
    /// Wrap a CHW buffer.
    ///
    /// # Errors
    /// Returns [`CoreError::BufferSizeMismatch`] if `data.len()` is not
    /// `channels * height * width`.
    pub fn new(channels: usize, height: usize, width: usize, data: Vec<f32>) -> Result<Self, CoreError> {
        let expected = channels * height * width;
        if data.len() != expected {
            return Err(CoreError::BufferSizeMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            channels,
            height,
            width,
            data,
        })
    }

    /// An image filled with zeros.
    pub fn zeros(channels: usize, height: usize, width: usize) -> Self {
        Self::filled(channels, height, width, 0.0)
    }

    /// An image with every value set to `value`.
    pub fn filled(channels: usize, height: usize, width: usize, value: f32) -> Self {
        Self {
            channels,
            height,
            width,
            data: alloc::vec![value; channels * height * width],
        }
    }

    /// Build an image by evaluating `f(channel, row, col)` for every value.
    pub fn from_fn<F>(channels: usize, height: usize, width: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize, usize) -> f32,
    {
        let mut data = Vec::with_capacity(channels * height * width);
        for c in 0..channels {
            for y in 0..height {
                for x in 0..width {
                    data.push(f(c, y, x));
                }
            }
        }
        Self {
            channels,
            height,
            width,
            data,
        }
    }

    /// Convert an interleaved HWC buffer (as decoded from image files).
    ///
    /// # Errors
    /// Returns [`CoreError::BufferSizeMismatch`] on a length mismatch.
    pub fn from_hwc(channels: usize, height: usize, width: usize, hwc: &[f32]) -> Result<Self, CoreError> {
        let expected = channels * height * width;
        if hwc.len() != expected {
            return Err(CoreError::BufferSizeMismatch {
                expected,
                got: hwc.len(),
            });
        }
        Ok(Self::from_fn(channels, height, width, |c, y, x| {
            hwc[(y * width + x) * channels + c]
        }))
    }

    /// Interleaved HWC copy of the buffer.
    pub fn to_hwc(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.data.len());
        for y in 0..self.height {
            for x in 0..self.width {
                for c in 0..self.channels {
                    out.push(self.get(c, y, x));
                }
            }
        }
        out
    }

    /// Number of channels.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of rows.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of columns.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Spatial extent.
    #[inline]
    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.height, self.width)
    }

    /// `[channels, height, width]`.
    #[inline]
    pub fn shape(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }

    /// Raw CHW values.
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable raw CHW values.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consume the image and return the CHW buffer.
    #[inline]
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    #[inline]
    fn index(&self, c: usize, y: usize, x: usize) -> usize {
        (c * self.height + y) * self.width + x
    }

    /// Value at `(channel, row, col)`. Panics when out of bounds.
    #[inline]
    pub fn get(&self, c: usize, y: usize, x: usize) -> f32 {
        self.data[self.index(c, y, x)]
    }

    /// Set the value at `(channel, row, col)`. Panics when out of bounds.
    #[inline]
    pub fn set(&mut self, c: usize, y: usize, x: usize, value: f32) {
        let i = self.index(c, y, x);
        self.data[i] = value;
    }

    /// One channel plane as a slice.
    ///
    /// # Errors
    /// Returns [`CoreError::ChannelOutOfRange`] for a bad index.
    pub fn channel(&self, index: usize) -> Result<&[f32], CoreError> {
        if index >= self.channels {
            return Err(CoreError::ChannelOutOfRange {
                index,
                channels: self.channels,
            });
        }
        let plane = self.height * self.width;
        Ok(&self.data[index * plane..(index + 1) * plane])
    }

    /// A new image holding only the listed channels, in the listed order.
    ///
    /// # Errors
    /// Returns [`CoreError::ChannelOutOfRange`] for a bad index.
    pub fn select_channels(&self, indices: &[usize]) -> Result<Self, CoreError> {
        let mut data = Vec::with_capacity(indices.len() * self.height * self.width);
        for &index in indices {
            data.extend_from_slice(self.channel(index)?);
        }
        Ok(Self {
            channels: indices.len(),
            height: self.height,
            width: self.width,
            data,
        })
    }

    /// Apply `f` to every value.
    pub fn map<F: Fn(f32) -> f32>(mut self, f: F) -> Self {
        for v in self.data.iter_mut() {
            *v = f(*v);
        }
        self
    }

    /// Per-channel mean of the four corner pixels.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyImage`] for an image without pixels.
    pub fn corner_color(&self) -> Result<Vec<f32>, CoreError> {
        if self.height == 0 || self.width == 0 {
            return Err(CoreError::EmptyImage);
        }
        let (h, w) = (self.height - 1, self.width - 1);
        Ok((0..self.channels)
            .map(|c| {
                (self.get(c, 0, 0) + self.get(c, 0, w) + self.get(c, h, 0) + self.get(c, h, w))
                    / 4.0
            })
            .collect())
    }

    /// Write `fill` into every channel at `(row, col)`.
    ///
    /// `fill` is either one value per channel or a single value broadcast
    /// to all channels.
    #[inline]
    pub fn fill_pixel(&mut self, y: usize, x: usize, fill: &[f32]) {
        for c in 0..self.channels {
            let v = if fill.len() == 1 { fill[0] } else { fill[c] };
            self.set(c, y, x, v);
        }
    }

    /// Check that `fill` can be used with [`Image::fill_pixel`].
    ///
    /// # Errors
    /// Returns [`CoreError::FillLengthMismatch`] unless the fill has one value
    /// or one value per channel.
    pub fn check_fill(&self, fill: &[f32]) -> Result<(), CoreError> {
        if fill.len() == 1 || fill.len() == self.channels {
            Ok(())
        } else {
            Err(CoreError::FillLengthMismatch {
                channels: self.channels,
                got: fill.len(),
            })
        }
    }

    /// Minimum and maximum value, or `None` for an empty buffer.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        let mut iter = self.data.iter().copied();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}

/// Place images side by side in a single row.
///
/// Every part must share height and channel count.
///
/// # Errors
/// Returns [`CoreError::SizeMismatch`] or [`CoreError::ChannelCountMismatch`]
/// when the parts disagree, [`CoreError::EmptyImage`] if `parts` is empty.
pub fn hstack(parts: &[Image]) -> Result<Image, CoreError> {
    let first = parts.first().ok_or(CoreError::EmptyImage)?;
    let (channels, height) = (first.channels, first.height);
    for part in parts {
        if part.channels != channels {
            return Err(CoreError::ChannelCountMismatch {
                expected: channels,
                got: part.channels,
            });
        }
        if part.height != height {
            return Err(CoreError::SizeMismatch {
                expected: (height, first.width),
                got: (part.height, part.width),
            });
        }
    }
    let width: usize = parts.iter().map(|p| p.width).sum();
    let mut out = Image::zeros(channels, height, width);
    let mut offset = 0;
    for part in parts {
        for c in 0..channels {
            for y in 0..height {
                for x in 0..part.width {
                    out.set(c, y, offset + x, part.get(c, y, x));
                }
            }
        }
        offset += part.width;
    }
    Ok(out)
}

/// Stack images top to bottom. Every part must share width and channel count.
///
/// # Errors
/// Same conditions as [`hstack`], with width in place of height.
pub fn vstack(parts: &[Image]) -> Result<Image, CoreError> {
    let first = parts.first().ok_or(CoreError::EmptyImage)?;
    let (channels, width) = (first.channels, first.width);
    let mut data = Vec::new();
    let mut height = 0;
    for part in parts {
        if part.channels != channels {
            return Err(CoreError::ChannelCountMismatch {
                expected: channels,
                got: part.channels,
            });
        }
        if part.width != width {
            return Err(CoreError::SizeMismatch {
                expected: (first.height, width),
                got: (part.height, part.width),
            });
        }
        height += part.height;
    }
    for c in 0..channels {
        for part in parts {
            data.extend_from_slice(part.channel(c)?);
        }
    }
    Image::new(channels, height, width, data)
}
