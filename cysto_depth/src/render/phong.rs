//! Differentiable point-light Phong shading.
//!
//! For every pixel the surface point is `p = depth · ray`. With
//! `l = normalize(light − p)`, `v = normalize(−p)` and
//! `r = 2(n·l)n − l` the rendered colour is
//!
//! ```text
//! att      = 1 / (1 + k·|light − p|²)
//! diffuse  = max(n·l, 0)
//! specular = max(v·r, 0)^shininess   where n·l > 0, else 0
//! out      = albedo · (ambient + att · diffuse_color · diffuse)
//!          + att · specular_color · specular
//! ```
//!
//! Every operation is a plain tensor op, so gradients flow to depth and
//! normals. The renderer has no parameters and no state.

use burn::prelude::*;
use cysto_core::Image;

use crate::config::PhongConfig;
use crate::convert::{image_to_tensor, tensor_to_image};
use crate::error::{CystoDepthError, Result};

use super::PixelRays;

const NORM_EPS: f32 = 1e-12;

/// Point light in camera coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    /// Position in metres.
    pub location: [f32; 3],
    /// Ambient colour.
    pub ambient: [f32; 3],
    /// Diffuse colour.
    pub diffuse: [f32; 3],
    /// Specular colour.
    pub specular: [f32; 3],
    /// Quadratic attenuation coefficient.
    pub attenuation: f32,
}

impl PointLight {
    /// Light described by a [`PhongConfig`].
    pub fn from_config(config: &PhongConfig) -> Self {
        Self {
            location: config.light_location,
            ambient: config.ambient_color,
            diffuse: config.diffusion_color,
            specular: config.specular_color,
            attenuation: config.attenuation,
        }
    }
}

/// Surface material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Specular exponent.
    pub shininess: f32,
    /// Constant grey albedo.
    pub albedo: f32,
}

impl Material {
    /// Material described by a [`PhongConfig`].
    pub fn from_config(config: &PhongConfig) -> Self {
        Self {
            shininess: config.material_shininess,
            albedo: config.albedo,
        }
    }
}

fn color<B: Backend>(rgb: [f32; 3], device: &B::Device) -> Tensor<B, 4> {
    Tensor::<B, 1>::from_floats(rgb, device).reshape([1, 3, 1, 1])
}

fn dot<B: Backend>(a: Tensor<B, 4>, b: Tensor<B, 4>) -> Tensor<B, 4> {
    (a * b).sum_dim(1)
}

fn normalize<B: Backend>(v: Tensor<B, 4>) -> Tensor<B, 4> {
    let norm = (v.clone().powf_scalar(2.0).sum_dim(1) + NORM_EPS).sqrt();
    v / norm
}

/// Shade a batch.
///
/// # Arguments
/// * `depth` - `[B, 1, H, W]` distance along the ray, in the same unit as the light position
/// * `normals` - `[B, 3, H, W]` unit surface normals
/// * `rays` - `[1, 3, H, W]` or `[B, 3, H, W]` ray directions with `z = 1`
///
/// # Returns
/// `[B, 3, H, W]` shaded colour.
pub fn render_rgbd<B: Backend>(
    depth: Tensor<B, 4>,
    normals: Tensor<B, 4>,
    rays: Tensor<B, 4>,
    light: &PointLight,
    material: &Material,
) -> Tensor<B, 4> {
    let device = depth.device();
    let points = rays * depth;
    let light_pos = color::<B>(light.location, &device);

    let to_light = light_pos - points.clone();
    let dist_sq = to_light.clone().powf_scalar(2.0).sum_dim(1);
    let l = normalize(to_light);
    let v = normalize(points.neg());

    let n_dot_l = dot(normals.clone(), l.clone());
    let diffuse = n_dot_l.clone().clamp_min(0.0);
    let lit = n_dot_l.clone().greater_elem(0.0).float();
    let reflected = normals * (n_dot_l * 2.0) - l;
    let specular = dot(v, reflected)
        .clamp_min(0.0)
        .powf_scalar(material.shininess)
        * lit;

    let attenuation = (dist_sq * light.attenuation + 1.0).recip();

    let ambient = color::<B>(light.ambient, &device);
    let diffuse_color = color::<B>(light.diffuse, &device);
    let specular_color = color::<B>(light.specular, &device);

    (ambient + diffuse_color * (attenuation.clone() * diffuse)) * material.albedo
        + specular_color * (attenuation * specular)
}

/// Rays, light and material bundled for repeated rendering at one
/// resolution.
#[derive(Debug, Clone)]
pub struct PhongRenderer<B: Backend> {
    rays: Tensor<B, 4>,
    light: PointLight,
    material: Material,
}

impl<B: Backend> PhongRenderer<B> {
    /// Create a renderer on `device`.
    pub fn new(rays: &PixelRays, light: PointLight, material: Material, device: &B::Device) -> Self {
        Self {
            rays: rays.to_tensor(device),
            light,
            material,
        }
    }

    /// Renderer for a [`PhongConfig`] at a square working size.
    ///
    /// # Errors
    /// Returns [`CystoDepthError::InvalidConfig`] for bad intrinsics.
    pub fn from_config(config: &PhongConfig, size: usize, device: &B::Device) -> Result<Self> {
        let intrinsics = config.intrinsics().map_err(CystoDepthError::config)?;
        let rays = PixelRays::new(&intrinsics, size)?;
        Ok(Self::new(
            &rays,
            PointLight::from_config(config),
            Material::from_config(config),
            device,
        ))
    }

    /// Side length of the ray field.
    pub fn size(&self) -> usize {
        self.rays.dims()[2]
    }

    /// Shade a `[B, 1, H, W]` depth and `[B, 3, H, W]` normals batch.
    pub fn render(&self, depth: Tensor<B, 4>, normals: Tensor<B, 4>) -> Tensor<B, 4> {
        render_rgbd(depth, normals, self.rays.clone(), &self.light, &self.material)
    }

    /// Shade single host images (`1×H×W` depth, `3×H×W` normals).
    ///
    /// # Errors
    /// Returns [`CystoDepthError::ShapeMismatch`] if the images do not match
    /// the ray field.
    pub fn render_image(&self, depth: &Image, normals: &Image) -> Result<Image> {
        let [_, _, h, w] = self.rays.dims();
        if depth.shape() != [1, h, w] {
            return Err(CystoDepthError::ShapeMismatch {
                expected: vec![1, h, w],
                got: depth.shape().to_vec(),
            });
        }
        if normals.shape() != [3, h, w] {
            return Err(CystoDepthError::ShapeMismatch {
                expected: vec![3, h, w],
                got: normals.shape().to_vec(),
            });
        }
        let device = self.rays.device();
        let depth = image_to_tensor::<B>(depth, &device).unsqueeze::<4>();
        let normals = image_to_tensor::<B>(normals, &device).unsqueeze::<4>();
        let shaded = self.render(depth, normals).squeeze::<3>(0);
        tensor_to_image(shaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::to_vec;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn flat_scene(
        device: &<TestBackend as Backend>::Device,
    ) -> (Tensor<TestBackend, 4>, Tensor<TestBackend, 4>, Tensor<TestBackend, 4>) {
        // A fronto-parallel wall at distance 2 facing the camera.
        let rays = Tensor::<TestBackend, 4>::zeros([1, 3, 2, 2], device)
            .slice_assign([0..1, 2..3, 0..2, 0..2], Tensor::ones([1, 1, 2, 2], device));
        let depth = Tensor::<TestBackend, 4>::full([1, 1, 2, 2], 2.0, device);
        let normals = Tensor::<TestBackend, 4>::zeros([1, 3, 2, 2], device)
            .slice_assign([0..1, 2..3, 0..2, 0..2], Tensor::full([1, 1, 2, 2], -1.0, device));
        (depth, normals, rays)
    }

    fn light() -> PointLight {
        PointLight {
            location: [0.0, 0.0, 0.0],
            ambient: [0.1, 0.1, 0.1],
            diffuse: [1.0, 1.0, 1.0],
            specular: [0.5, 0.5, 0.5],
            attenuation: 0.0,
        }
    }

    #[test]
    fn test_head_on_light() {
        let device = Default::default();
        let (depth, normals, rays) = flat_scene(&device);
        let material = Material {
            shininess: 10.0,
            albedo: 0.5,
        };
        let out = render_rgbd(depth, normals, rays, &light(), &material);
        assert_eq!(out.dims(), [1, 3, 2, 2]);

        // n·l = 1 and v·r = 1: 0.5 · (0.1 + 1) + 0.5.
        for v in to_vec(out).unwrap() {
            assert!((v - 1.05).abs() < 1e-5, "got {v}");
        }
    }

    #[test]
    fn test_attenuation_and_backface() {
        let device = Default::default();
        let (depth, normals, rays) = flat_scene(&device);
        let material = Material {
            shininess: 10.0,
            albedo: 1.0,
        };
        let attenuated = PointLight {
            attenuation: 0.75,
            ..light()
        };
        // d² = 4, so att = 1 / 4.
        let out = render_rgbd(depth.clone(), normals.clone(), rays.clone(), &attenuated, &material);
        for v in to_vec(out).unwrap() {
            assert!((v - (0.1 + 0.25 + 0.125)).abs() < 1e-5, "got {v}");
        }

        // Normals facing away receive only ambient light.
        let away = normals.neg();
        let out = render_rgbd(depth, away, rays, &light(), &material);
        for v in to_vec(out).unwrap() {
            assert!((v - 0.1).abs() < 1e-5, "got {v}");
        }
    }

    #[test]
    fn test_render_is_pure() {
        let device = Default::default();
        let config = PhongConfig::new()
            .with_camera_intrinsics([[20.0, 0.0, 8.0], [0.0, 20.0, 8.0], [0.0, 0.0, 1.0]]);
        let renderer = PhongRenderer::<TestBackend>::from_config(&config, 8, &device).unwrap();
        let depth = Image::from_fn(1, 8, 8, |_, y, x| 0.05 + 0.001 * (y + x) as f32);
        let normals = Image::from_fn(3, 8, 8, |c, _, _| if c == 2 { -1.0 } else { 0.0 });

        let a = renderer.render_image(&depth, &normals).unwrap();
        let b = renderer.render_image(&depth, &normals).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.shape(), [3, 8, 8]);

        let wrong = Image::zeros(1, 4, 4);
        assert!(renderer.render_image(&wrong, &normals).is_err());
    }

    #[test]
    fn test_gradient_reaches_depth_and_normals() {
        use burn::backend::Autodiff;
        type AD = Autodiff<NdArray>;

        let device = Default::default();
        let rays = Tensor::<AD, 4>::ones([1, 3, 2, 2], &device);
        let depth = Tensor::<AD, 4>::full([1, 1, 2, 2], 0.5, &device).require_grad();
        let normals = Tensor::<AD, 4>::full([1, 3, 2, 2], -0.577, &device).require_grad();
        let light = PointLight {
            attenuation: 0.5,
            ..light()
        };
        let material = Material {
            shininess: 4.0,
            albedo: 0.5,
        };
        let loss = render_rgbd(depth.clone(), normals.clone(), rays, &light, &material).sum();
        let grads = loss.backward();
        let gd = depth.grad(&grads).unwrap();
        let gn = normals.grad(&grads).unwrap();
        assert!(to_vec(gd).unwrap().iter().all(|g| g.is_finite()));
        let gn = to_vec(gn).unwrap();
        assert!(gn.iter().all(|g| g.is_finite()));
        assert!(gn.iter().any(|g| g.abs() > 0.0));
    }
}
