//! Data loading and augmentation configuration.

use burn::config::Config;
use cysto_io::RatioRounding;

/// Colour jitter strengths. Each factor is drawn uniformly from
/// `[max(0, 1 - s), 1 + s]`; the hue shift from `[-hue, hue]`.
#[derive(Config, Debug)]
pub struct ColorJitterConfig {
    /// Brightness strength.
    #[config(default = 0.2)]
    pub brightness: f32,

    /// Contrast strength.
    #[config(default = 0.2)]
    pub contrast: f32,

    /// Saturation strength.
    #[config(default = 0.2)]
    pub saturation: f32,

    /// Hue strength, at most 0.5.
    #[config(default = 0.1)]
    pub hue: f32,
}

impl Default for ColorJitterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorJitterConfig {
    /// Jitter that leaves images untouched.
    pub fn disabled() -> Self {
        Self::new()
            .with_brightness(0.0)
            .with_contrast(0.0)
            .with_saturation(0.0)
            .with_hue(0.0)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.brightness < 0.0 || self.contrast < 0.0 || self.saturation < 0.0 {
            return Err("colour jitter strengths must be non-negative".to_string());
        }
        if !(0.0..=0.5).contains(&self.hue) {
            return Err("hue jitter must lie in [0, 0.5]".to_string());
        }
        Ok(())
    }
}

/// Configuration of datasets, augmentation and loaders.
#[derive(Config, Debug)]
pub struct DataConfig {
    /// Samples per batch.
    #[config(default = 8)]
    pub batch_size: usize,

    /// Side of the square working resolution.
    #[config(default = 256)]
    pub image_size: usize,

    /// Worker threads per loader.
    #[config(default = 6)]
    pub workers_per_loader: usize,

    /// Multiplier applied to raw depth (metres to millimetres).
    #[config(default = 1e3)]
    pub depth_scale: f32,

    /// Range the mask radius factor is drawn from.
    #[config(default = "[0.9, 1.0]")]
    pub mask_radius_range: [f32; 2],

    /// Range the affine rotation (degrees) is drawn from.
    #[config(default = "[0.0, 359.0]")]
    pub affine_degrees: [f32; 2],

    /// Maximum affine translation as a fraction of width and height.
    #[config(default = "[0.0, 0.0]")]
    pub affine_translate: [f32; 2],

    /// Colour jitter applied to training colour images.
    #[config(default = "ColorJitterConfig::new()")]
    pub color_jitter: ColorJitterConfig,

    /// Normals are stored in `[0, 1]` and must be mapped to `[-1, 1]`.
    #[config(default = false)]
    pub normals_from_unit_range: bool,

    /// Rounding rule for ratio splits.
    #[config(default = "RatioRounding::Nearest")]
    pub ratio_rounding: RatioRounding,

    /// Run-level seed for splits, shuffling and augmentation.
    #[config(default = 42)]
    pub seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DataConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch_size must be positive".to_string());
        }
        if self.image_size == 0 {
            return Err("image_size must be positive".to_string());
        }
        if self.workers_per_loader == 0 {
            return Err("workers_per_loader must be positive".to_string());
        }
        if self.depth_scale <= 0.0 {
            return Err("depth_scale must be positive".to_string());
        }
        let [lo, hi] = self.mask_radius_range;
        if lo > hi || lo <= 0.0 {
            return Err("mask_radius_range must be an increasing positive range".to_string());
        }
        if self.affine_degrees[0] > self.affine_degrees[1] {
            return Err("affine_degrees must be an increasing range".to_string());
        }
        if self.affine_translate.iter().any(|t| !(0.0..=1.0).contains(t)) {
            return Err("affine_translate fractions must lie in [0, 1]".to_string());
        }
        self.color_jitter.validate()
    }
}
