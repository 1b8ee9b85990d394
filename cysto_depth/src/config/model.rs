//! Network configuration.

use burn::config::Config;

/// Configuration of the depth/normals network.
#[derive(Config, Debug)]
pub struct DepthModelConfig {
    /// Input image channels.
    #[config(default = 3)]
    pub in_channels: usize,

    /// Feature channels of each encoder level, finest first. Every level
    /// after the first halves the resolution.
    #[config(default = "vec![16, 32, 64, 128]")]
    pub encoder_channels: Vec<usize>,

    /// Number of depth scales produced by the decoder, coarse to fine.
    #[config(default = 3)]
    pub num_scales: usize,

    /// Predict surface normals in addition to depth.
    #[config(default = true)]
    pub predict_normals: bool,

    /// Produce normals from a single 4-channel decoder instead of a second
    /// 3-channel decoder.
    #[config(default = false)]
    pub merged_decoder: bool,

    /// Normals are zeroed where the finest predicted depth is below this.
    #[config(default = 1.0)]
    pub min_depth: f32,
}

impl Default for DepthModelConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DepthModelConfig {
    /// Channels of each depth head: depth plus merged normals if enabled.
    pub fn depth_head_channels(&self) -> usize {
        if self.predict_normals && self.merged_decoder {
            4
        } else {
            1
        }
    }

    /// Whether a separate normals decoder is built.
    pub fn separate_normals_decoder(&self) -> bool {
        self.predict_normals && !self.merged_decoder
    }

    /// Input side length must be a multiple of this.
    pub fn size_multiple(&self) -> usize {
        1 << self.encoder_channels.len().saturating_sub(1)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.in_channels == 0 {
            return Err("in_channels must be positive".to_string());
        }
        if self.encoder_channels.len() < 2 {
            return Err("encoder needs at least two levels".to_string());
        }
        if self.encoder_channels.contains(&0) {
            return Err("encoder channels must be positive".to_string());
        }
        if self.num_scales == 0 || self.num_scales > self.encoder_channels.len() {
            return Err(format!(
                "num_scales must lie in 1..={}",
                self.encoder_channels.len()
            ));
        }
        if self.min_depth < 0.0 {
            return Err("min_depth must be non-negative".to_string());
        }
        Ok(())
    }
}
