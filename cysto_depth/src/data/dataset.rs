//! Indexed sample sources.
//!
//! Samples are decoded freshly on every fetch; nothing is cached. The
//! augmentation of a sample depends only on the run seed, the epoch and the
//! index, see [`SampleRng`].

use std::fmt;
use std::path::PathBuf;

use burn::prelude::*;
use cysto_core::Image;
use cysto_io::load_image;

use super::pipeline::Pipeline;
use super::rng::SampleRng;
use super::sync::SampleTransform;
use super::transforms::{ChannelSlice, Squarify, Transform, UnitToSigned};
use crate::error::{CystoDepthError, Result};
use crate::render::PhongRenderer;

/// Meaning of a channel within a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelRole {
    /// Network input.
    Color,
    /// Ground-truth Phong shading.
    Phong,
    /// Ground-truth depth.
    Depth,
    /// Ground-truth normals.
    Normals,
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Color => "color",
            Self::Phong => "phong",
            Self::Depth => "depth",
            Self::Normals => "normals",
        })
    }
}

/// Aligned channels of one scene, in the order of the source's layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Index of the sample within its source.
    pub index: usize,
    /// One image per layout entry.
    pub channels: Vec<Image>,
}

/// An indexed collection of samples.
///
/// Implementations must be `Send + Sync` so loaders can fetch from several
/// worker threads.
pub trait SampleSource: Send + Sync {
    /// Number of samples.
    fn len(&self) -> usize;

    /// Whether the source is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Channel order of every sample.
    fn layout(&self) -> &[ChannelRole];

    /// Load and augment sample `index` for `epoch`.
    ///
    /// # Errors
    /// Returns an error if a file cannot be decoded or a transform fails.
    fn fetch(&self, index: usize, epoch: usize) -> Result<Sample>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        "dataset"
    }
}

fn sample_files(files: &[Vec<PathBuf>], index: usize) -> Result<&[PathBuf]> {
    files.get(index).map(Vec::as_slice).ok_or_else(|| {
        CystoDepthError::Data(format!("sample index {index} out of range ({})", files.len()))
    })
}

/// Paired image files run through one pipeline.
#[derive(Debug)]
pub struct ImageDataset {
    name: String,
    files: Vec<Vec<PathBuf>>,
    layout: Vec<ChannelRole>,
    pipeline: Pipeline,
    rng: SampleRng,
}

impl ImageDataset {
    /// Dataset over `files`, one path per layout entry and sample.
    ///
    /// # Errors
    /// Returns [`CystoDepthError::SyncArity`] if a sample has the wrong number
    /// of files.
    pub fn new(
        name: impl Into<String>,
        files: Vec<Vec<PathBuf>>,
        layout: Vec<ChannelRole>,
        pipeline: Pipeline,
        rng: SampleRng,
    ) -> Result<Self> {
        if let Some(bad) = files.iter().find(|f| f.len() != layout.len()) {
            return Err(CystoDepthError::SyncArity {
                expected: layout.len(),
                got: bad.len(),
            });
        }
        Ok(Self {
            name: name.into(),
            files,
            layout,
            pipeline,
            rng,
        })
    }
}

impl SampleSource for ImageDataset {
    fn len(&self) -> usize {
        self.files.len()
    }

    fn layout(&self) -> &[ChannelRole] {
        &self.layout
    }

    fn fetch(&self, index: usize, epoch: usize) -> Result<Sample> {
        let channels = sample_files(&self.files, index)?
            .iter()
            .map(|p| Ok(load_image(p)?))
            .collect::<Result<Vec<_>>>()?;
        let mut rng = self.rng.for_sample(epoch, index);
        let channels = self.pipeline.apply(channels, &mut rng)?;
        Ok(Sample { index, channels })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Colour, depth and normals files plus a Phong shading rendered from the
/// ground truth.
///
/// Per fetch: decode, squarify to the working size, keep the first depth
/// channel, optionally map normals to `[-1, 1]`, render the shading from
/// depth and normals, then run the post pipeline over
/// `[color, phong, depth?, normals?]`. The renderer works on the raw depth
/// unit; scaling belongs in the post pipeline.
#[derive(Debug)]
pub struct PhongDataset<R: Backend> {
    name: String,
    files: Vec<Vec<PathBuf>>,
    image_size: usize,
    normals_from_unit_range: bool,
    return_depth: bool,
    return_normals: bool,
    layout: Vec<ChannelRole>,
    renderer: PhongRenderer<R>,
    post: Pipeline,
    rng: SampleRng,
}

impl<R: Backend> PhongDataset<R> {
    /// Channel layout for the requested ground-truth outputs.
    pub fn layout_for(return_depth: bool, return_normals: bool) -> Vec<ChannelRole> {
        let mut layout = vec![ChannelRole::Color, ChannelRole::Phong];
        if return_depth {
            layout.push(ChannelRole::Depth);
        }
        if return_normals {
            layout.push(ChannelRole::Normals);
        }
        layout
    }

    /// Dataset over `(color, depth, normals)` file triples.
    ///
    /// # Errors
    /// Returns [`CystoDepthError::SyncArity`] for samples without three files
    /// and [`CystoDepthError::ShapeMismatch`] if the renderer does not work at
    /// `image_size`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        files: Vec<Vec<PathBuf>>,
        image_size: usize,
        normals_from_unit_range: bool,
        return_depth: bool,
        return_normals: bool,
        renderer: PhongRenderer<R>,
        post: Pipeline,
        rng: SampleRng,
    ) -> Result<Self> {
        if let Some(bad) = files.iter().find(|f| f.len() != 3) {
            return Err(CystoDepthError::SyncArity {
                expected: 3,
                got: bad.len(),
            });
        }
        if renderer.size() != image_size {
            return Err(CystoDepthError::ShapeMismatch {
                expected: vec![image_size, image_size],
                got: vec![renderer.size(), renderer.size()],
            });
        }
        Ok(Self {
            name: name.into(),
            files,
            image_size,
            normals_from_unit_range,
            return_depth,
            return_normals,
            layout: Self::layout_for(return_depth, return_normals),
            renderer,
            post,
            rng,
        })
    }
}

impl<R: Backend> SampleSource for PhongDataset<R> {
    fn len(&self) -> usize {
        self.files.len()
    }

    fn layout(&self) -> &[ChannelRole] {
        &self.layout
    }

    fn fetch(&self, index: usize, epoch: usize) -> Result<Sample> {
        let paths = sample_files(&self.files, index)?;
        let mut rng = self.rng.for_sample(epoch, index);
        let squarify = Squarify(Some(self.image_size));

        let color = squarify.apply(load_image(&paths[0])?, &mut rng)?;
        let depth = squarify.apply(load_image(&paths[1])?, &mut rng)?;
        let depth = ChannelSlice(0).apply(depth, &mut rng)?;
        let mut normals = squarify.apply(load_image(&paths[2])?, &mut rng)?;
        if self.normals_from_unit_range {
            normals = UnitToSigned.apply(normals, &mut rng)?;
        }

        let phong = self.renderer.render_image(&depth, &normals)?;
        let mut channels = vec![color, phong];
        if self.return_depth {
            channels.push(depth);
        }
        if self.return_normals {
            channels.push(normals);
        }

        let channels = self.post.apply(channels, &mut rng)?;
        Ok(Sample { index, channels })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
