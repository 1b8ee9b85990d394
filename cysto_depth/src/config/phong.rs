//! Phong rendering configuration.

use burn::config::Config;
use cysto_core::CameraIntrinsics;

/// Camera, light and material parameters of the Phong renderer.
///
/// The same values render the ground-truth shading at load time and the
/// predicted shading inside the loss, so they must not change between the
/// data module and the task.
#[derive(Config, Debug)]
pub struct PhongConfig {
    /// Emit the ground-truth normals channel in each sample.
    #[config(default = true)]
    pub return_normals: bool,

    /// Emit the ground-truth depth channel in each sample.
    #[config(default = true)]
    pub return_depth: bool,

    /// Pinhole intrinsics of the source camera as a row-major 3x3 matrix.
    /// The original frame size is inferred as `2·cy × 2·cx`.
    #[config(default = "[[1038.0, 0.0, 960.0], [0.0, 1038.0, 540.0], [0.0, 0.0, 1.0]]")]
    pub camera_intrinsics: [[f32; 3]; 3],

    /// Specular exponent.
    #[config(default = 100.0)]
    pub material_shininess: f32,

    /// Diffuse light colour.
    #[config(default = "[0.3, 0.3, 0.3]")]
    pub diffusion_color: [f32; 3],

    /// Specular light colour.
    #[config(default = "[0.2, 0.2, 0.2]")]
    pub specular_color: [f32; 3],

    /// Ambient light colour.
    #[config(default = "[0.5, 0.5, 0.5]")]
    pub ambient_color: [f32; 3],

    /// Quadratic distance attenuation `k` in `1 / (1 + k·d²)`.
    #[config(default = 0.0)]
    pub attenuation: f32,

    /// Constant grey albedo of the rendered surface.
    #[config(default = 0.5)]
    pub albedo: f32,

    /// Point light position in camera coordinates (metres).
    #[config(default = "[0.0, 0.0, 0.0]")]
    pub light_location: [f32; 3],
}

impl Default for PhongConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PhongConfig {
    /// Parsed camera intrinsics.
    ///
    /// # Errors
    /// Returns a message if the matrix is not a valid pinhole matrix.
    pub fn intrinsics(&self) -> Result<CameraIntrinsics, String> {
        CameraIntrinsics::from_matrix(self.camera_intrinsics).map_err(|e| e.to_string())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.intrinsics()?;
        if self.material_shininess <= 0.0 {
            return Err("material_shininess must be positive".to_string());
        }
        if self.attenuation < 0.0 {
            return Err("attenuation must be non-negative".to_string());
        }
        if !(0.0..=1.0).contains(&self.albedo) {
            return Err("albedo must lie in [0, 1]".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_phong_config() {
        let config = PhongConfig::default();
        assert!(config.validate().is_ok());
        let k = config.intrinsics().unwrap();
        assert_eq!(k.image_size(), cysto_core::ImageSize::new(1080, 1920));
    }

    #[test]
    fn test_rejects_bad_intrinsics() {
        let config = PhongConfig::new()
            .with_camera_intrinsics([[0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 0.0, 1.0]]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = PhongConfig::new().with_attenuation(0.01);
        let json = serde_json::to_string(&config).unwrap();
        let back: PhongConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.attenuation, 0.01);
        assert_eq!(back.camera_intrinsics, config.camera_intrinsics);
    }
}
