//! Top-level experiment configuration.

use std::path::PathBuf;

use burn::config::Config;
use cysto_io::{DataDirs, SplitSource, SplitSpec};

use super::{DataConfig, DepthModelConfig, PhongConfig, TrainingConfig};
use crate::error::CystoDepthError;

/// Everything needed to run one experiment: data locations, split,
/// rendering, network and optimisation settings.
#[derive(Config, Debug)]
pub struct CystoDepthConfig {
    /// Root of the colour images.
    pub color_dir: String,

    /// Root of the depth maps.
    pub depth_dir: String,

    /// Root of the normal maps, if any.
    pub normals_dir: Option<String>,

    /// How files are assigned to stages when no manifest is given.
    #[config(default = "SplitSpec::default()")]
    pub split: SplitSpec,

    /// Load the split from this manifest instead of building it.
    pub split_manifest: Option<String>,

    /// Write the resulting split manifest here.
    pub save_split: Option<String>,

    /// Write validation figures as PNG files into this directory.
    pub figure_dir: Option<String>,

    /// Renderer settings.
    #[config(default = "PhongConfig::new()")]
    pub phong: PhongConfig,

    /// Data settings.
    #[config(default = "DataConfig::new()")]
    pub data: DataConfig,

    /// Network settings.
    #[config(default = "DepthModelConfig::new()")]
    pub model: DepthModelConfig,

    /// Optimisation settings.
    #[config(default = "TrainingConfig::new()")]
    pub training: TrainingConfig,
}

impl CystoDepthConfig {
    /// Modality roots.
    pub fn data_dirs(&self) -> DataDirs {
        let dirs = DataDirs::new(&self.color_dir, &self.depth_dir);
        match &self.normals_dir {
            Some(normals) => dirs.with_normals(normals),
            None => dirs,
        }
    }

    /// Where the split comes from.
    pub fn split_source(&self) -> SplitSource {
        match &self.split_manifest {
            Some(path) => SplitSource::Manifest(PathBuf::from(path)),
            None => SplitSource::Spec(self.split.clone()),
        }
    }

    /// Validate every section and their combination.
    ///
    /// # Errors
    /// Returns [`CystoDepthError::InvalidConfig`] naming the first problem.
    pub fn validate(&self) -> crate::error::Result<()> {
        self.phong.validate().map_err(CystoDepthError::config)?;
        self.data.validate().map_err(CystoDepthError::config)?;
        self.model.validate().map_err(CystoDepthError::config)?;
        self.training.validate().map_err(CystoDepthError::config)?;

        if self.phong.return_normals && self.normals_dir.is_none() {
            return Err(CystoDepthError::config(
                "return_normals needs normals_dir",
            ));
        }
        if self.data.image_size % self.model.size_multiple() != 0 {
            return Err(CystoDepthError::config(format!(
                "image_size {} must be a multiple of {}",
                self.data.image_size,
                self.model.size_multiple()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cysto_io::{Modality, Stage, StageSpec};

    fn config() -> CystoDepthConfig {
        CystoDepthConfig::new("/data/color".into(), "/data/depth".into())
            .with_normals_dir(Some("/data/normals".into()))
    }

    #[test]
    fn test_default_experiment_is_valid() {
        let config = config();
        assert!(config.validate().is_ok());
        assert_eq!(config.data_dirs().len(), 3);
        assert!(matches!(config.split_source(), SplitSource::Spec(_)));
    }

    #[test]
    fn test_normals_dir_required_for_normals() {
        let config = CystoDepthConfig::new("/c".into(), "/d".into());
        assert!(config.validate().is_err());

        let config = config.with_phong(PhongConfig::new().with_return_normals(false));
        assert!(config.validate().is_ok());
        assert!(config.data_dirs().get(Modality::Normals).is_none());
    }

    #[test]
    fn test_image_size_multiple() {
        let config = config().with_data(DataConfig::new().with_image_size(100));
        assert!(matches!(
            config.validate(),
            Err(CystoDepthError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_json_roundtrip_keeps_split() {
        let config = config()
            .with_split(SplitSpec::new().with_ratio(Stage::Train, 0.8))
            .with_split_manifest(Some("split.json".into()));
        let json = serde_json::to_string(&config).unwrap();
        let back: CystoDepthConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.split.get(Stage::Train), Some(&StageSpec::Ratio(0.8)));
        assert!(matches!(back.split_source(), SplitSource::Manifest(_)));
    }
}
