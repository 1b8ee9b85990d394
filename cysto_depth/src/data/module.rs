//! Data modules: split construction plus per-stage datasets and loaders.

use std::path::PathBuf;
use std::sync::Arc;

use burn::prelude::*;
use cysto_io::{DataDirs, Modality, SplitBuilder, SplitManifest, SplitSource, Stage};

use super::dataset::{ChannelRole, ImageDataset, PhongDataset, SampleSource};
use super::loader::BatchLoader;
use super::pipeline::Pipeline;
use super::rng::SampleRng;
use super::sync::{AffineArgs, EndoMask, MaskFill, RandomAffine, Synchronized};
use super::transforms::{ChannelSlice, ColorJitter, ElementWiseScale, Squarify};
use crate::config::{CystoDepthConfig, DataConfig, PhongConfig};
use crate::error::{CystoDepthError, Result};
use crate::render::PhongRenderer;

/// Provides a sample source and a loader for every stage.
pub trait DataModule {
    /// The split in use.
    fn manifest(&self) -> &SplitManifest;

    /// Data settings.
    fn data_config(&self) -> &DataConfig;

    /// Sample source of `stage`.
    ///
    /// # Errors
    /// Returns an error if the stage's files or transforms cannot be set up.
    fn source(&self, stage: Stage) -> Result<Arc<dyn SampleSource>>;

    /// Loader of `stage`; only the training loader shuffles.
    ///
    /// # Errors
    /// Propagates [`DataModule::source`] and thread-pool errors.
    fn loader(&self, stage: Stage) -> Result<BatchLoader> {
        let source = self.source(stage)?;
        let data = self.data_config();
        log::info!("{} dataset: {} samples", stage, source.len());
        BatchLoader::new(
            source,
            data.batch_size,
            data.workers_per_loader,
            stage == Stage::Train,
            SampleRng::new(data.seed),
        )
    }
}

fn build_manifest(dirs: DataDirs, source: &SplitSource, data: &DataConfig) -> Result<SplitManifest> {
    let manifest = SplitBuilder::new(dirs)
        .with_rounding(data.ratio_rounding)
        .with_seed(data.seed)
        .build(source)?;
    manifest.check_disjoint()?;
    Ok(manifest)
}

/// Colour, depth and normals with a Phong shading rendered from the ground
/// truth at load time.
///
/// Rendering runs on backend `R` (typically a CPU backend) inside the
/// loader workers.
#[derive(Debug)]
pub struct PhongDataModule<R: Backend> {
    manifest: SplitManifest,
    data: DataConfig,
    phong: PhongConfig,
    device: R::Device,
}

impl<R: Backend> PhongDataModule<R> {
    /// Build the split over three modality directories.
    ///
    /// # Errors
    /// Returns [`CystoDepthError::InvalidConfig`] without a normals directory
    /// and propagates split errors.
    pub fn new(
        dirs: DataDirs,
        source: &SplitSource,
        data: DataConfig,
        phong: PhongConfig,
        device: R::Device,
    ) -> Result<Self> {
        if dirs.get(Modality::Normals).is_none() {
            return Err(CystoDepthError::config(
                "phong data needs a normals directory",
            ));
        }
        data.validate().map_err(CystoDepthError::config)?;
        phong.validate().map_err(CystoDepthError::config)?;
        let manifest = build_manifest(dirs, source, &data)?;
        Ok(Self {
            manifest,
            data,
            phong,
            device,
        })
    }

    /// Build from an experiment configuration and save the split if asked.
    ///
    /// # Errors
    /// Propagates validation, split and manifest I/O errors.
    pub fn from_config(config: &CystoDepthConfig, device: R::Device) -> Result<Self> {
        config.validate()?;
        let module = Self::new(
            config.data_dirs(),
            &config.split_source(),
            config.data.clone(),
            config.phong.clone(),
            device,
        )?;
        if let Some(path) = &config.save_split {
            module.manifest.save(path)?;
        }
        Ok(module)
    }

    /// Channel layout of every sample.
    pub fn layout(&self) -> Vec<ChannelRole> {
        PhongDataset::<R>::layout_for(self.phong.return_depth, self.phong.return_normals)
    }

    /// Transforms applied after rendering.
    ///
    /// All stages: depth scaled by `depth_scale`, then one mask shared by all
    /// channels (random dark fill for colour, zero elsewhere). Training adds
    /// colour jitter first and a shared affine last (corner fill for colour,
    /// zero fill plus re-mask for depth and normals).
    pub fn post_transforms(&self, stage: Stage) -> Pipeline {
        let train = stage == Stage::Train;
        let layout = self.layout();
        let slot = |role| layout.iter().position(|r| *r == role);

        let mut pipeline = Pipeline::new()
            .on_if(train, 0, ColorJitter::new(self.data.color_jitter.clone()));
        if let Some(depth) = slot(ChannelRole::Depth) {
            pipeline = pipeline.on(depth, ElementWiseScale(self.data.depth_scale));
        }

        let fills = layout
            .iter()
            .map(|role| match role {
                ChannelRole::Color => MaskFill::RandomDark,
                _ => MaskFill::Value(0.0),
            })
            .collect();
        pipeline = pipeline.then(Synchronized::new(
            EndoMask::new(self.data.mask_radius_range),
            fills,
        ));

        if train {
            let args = layout
                .iter()
                .map(|role| match role {
                    ChannelRole::Color => AffineArgs::CORNER_FILL,
                    ChannelRole::Phong => AffineArgs::ZERO_FILL,
                    ChannelRole::Depth | ChannelRole::Normals => AffineArgs::REMASK,
                })
                .collect();
            pipeline = pipeline.then(Synchronized::new(
                RandomAffine::new(self.data.affine_degrees, self.data.affine_translate),
                args,
            ));
        }
        pipeline
    }

    /// Dataset of `stage`.
    ///
    /// # Errors
    /// Propagates manifest and renderer errors.
    pub fn dataset(&self, stage: Stage) -> Result<PhongDataset<R>> {
        let files = self
            .manifest
            .samples(stage, &[Modality::Color, Modality::Depth, Modality::Normals])?;
        let renderer = PhongRenderer::from_config(&self.phong, self.data.image_size, &self.device)?;
        PhongDataset::new(
            stage.as_str(),
            files,
            self.data.image_size,
            self.data.normals_from_unit_range,
            self.phong.return_depth,
            self.phong.return_normals,
            renderer,
            self.post_transforms(stage),
            SampleRng::new(self.data.seed),
        )
    }
}

impl<R: Backend> DataModule for PhongDataModule<R> {
    fn manifest(&self) -> &SplitManifest {
        &self.manifest
    }

    fn data_config(&self) -> &DataConfig {
        &self.data
    }

    fn source(&self, stage: Stage) -> Result<Arc<dyn SampleSource>> {
        Ok(Arc::new(self.dataset(stage)?))
    }
}

/// Colour and depth only.
///
/// Per sample: keep the first depth channel and scale it, mask with a full
/// circle (random dark colour, zero for depth), squarify; training adds
/// colour jitter and a shared affine with translation and corner fill for
/// colour.
#[derive(Debug)]
pub struct DepthDataModule {
    manifest: SplitManifest,
    data: DataConfig,
    affine_translate: [f32; 2],
}

impl DepthDataModule {
    /// Default affine translation as a fraction of the image size.
    pub const DEFAULT_TRANSLATE: [f32; 2] = [0.1, 0.1];

    /// Build the split over a colour and a depth directory.
    ///
    /// # Errors
    /// Propagates validation and split errors.
    pub fn new(
        color_dir: impl Into<PathBuf>,
        depth_dir: impl Into<PathBuf>,
        source: &SplitSource,
        data: DataConfig,
    ) -> Result<Self> {
        data.validate().map_err(CystoDepthError::config)?;
        let manifest = build_manifest(DataDirs::new(color_dir, depth_dir), source, &data)?;
        Ok(Self {
            manifest,
            data,
            affine_translate: Self::DEFAULT_TRANSLATE,
        })
    }

    /// Override the affine translation range.
    pub fn with_affine_translate(mut self, translate: [f32; 2]) -> Self {
        self.affine_translate = translate;
        self
    }

    /// Transforms of `stage` over `[color, depth]`.
    pub fn transforms(&self, stage: Stage) -> Pipeline {
        let size = Some(self.data.image_size);
        let pipeline = Pipeline::new()
            .on(1, ChannelSlice(0))
            .on(1, ElementWiseScale(self.data.depth_scale))
            .then(Synchronized::new(
                EndoMask::fixed(1.0),
                vec![MaskFill::RandomDark, MaskFill::Value(0.0)],
            ))
            .on(0, Squarify(size))
            .on(1, Squarify(size));
        if stage != Stage::Train {
            return pipeline;
        }
        pipeline
            .on(0, ColorJitter::new(self.data.color_jitter.clone()))
            .then(Synchronized::new(
                RandomAffine::new(self.data.affine_degrees, self.affine_translate),
                vec![AffineArgs::CORNER_FILL, AffineArgs::ZERO_FILL],
            ))
    }

    /// Dataset of `stage`.
    ///
    /// # Errors
    /// Propagates manifest errors.
    pub fn dataset(&self, stage: Stage) -> Result<ImageDataset> {
        let files = self
            .manifest
            .samples(stage, &[Modality::Color, Modality::Depth])?;
        ImageDataset::new(
            stage.as_str(),
            files,
            vec![ChannelRole::Color, ChannelRole::Depth],
            self.transforms(stage),
            SampleRng::new(self.data.seed),
        )
    }
}

impl DataModule for DepthDataModule {
    fn manifest(&self) -> &SplitManifest {
        &self.manifest
    }

    fn data_config(&self) -> &DataConfig {
        &self.data
    }

    fn source(&self, stage: Stage) -> Result<Arc<dyn SampleSource>> {
        Ok(Arc::new(self.dataset(stage)?))
    }
}
