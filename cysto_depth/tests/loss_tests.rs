//! Integration tests for the combined training objective.

use burn::backend::{Autodiff, NdArray};
use burn::prelude::*;

use cysto_depth::{
    config::PhongConfig,
    data::DepthBatch,
    loss::{DepthLoss, LossWeights, PhongLoss},
    nn::DepthOutput,
    render::PhongRenderer,
    CystoDepthError,
};

type TestBackend = Autodiff<NdArray>;

const SIZE: usize = 8;
const DEPTH_SCALE: f32 = 1000.0;

fn phong_loss(device: &<TestBackend as Backend>::Device) -> PhongLoss<TestBackend> {
    let config = PhongConfig::new()
        .with_camera_intrinsics([[30.0, 0.0, 8.0], [0.0, 30.0, 6.0], [0.0, 0.0, 1.0]])
        .with_attenuation(1000.0);
    let renderer = PhongRenderer::from_config(&config, SIZE, device).unwrap();
    PhongLoss::new(renderer, DEPTH_SCALE)
}

/// Normals facing the camera.
fn facing(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 4> {
    let z = Tensor::<TestBackend, 4>::ones([1, 1, SIZE, SIZE], device).neg();
    let xy = Tensor::<TestBackend, 4>::zeros([1, 2, SIZE, SIZE], device);
    Tensor::cat(vec![xy, z], 1)
}

fn batch(
    depth: f32,
    phong: Option<Tensor<TestBackend, 4>>,
    device: &<TestBackend as Backend>::Device,
) -> DepthBatch<TestBackend> {
    DepthBatch {
        color: Tensor::zeros([1, 3, SIZE, SIZE], device),
        phong,
        depth: Some(Tensor::full([1, 1, SIZE, SIZE], depth, device)),
        normals: Some(facing(device)),
        indices: vec![0],
    }
}

fn only(phong: f32, depth: f32) -> LossWeights {
    LossWeights {
        depth,
        gradient: 0.0,
        normals: 0.0,
        regularization: 0.0,
        phong,
    }
}

#[test]
fn test_zero_weights_remove_gradient_contribution() {
    let device = Default::default();
    let loss = DepthLoss::new(only(0.0, 1.0), Some(phong_loss(&device)));
    let gt_phong = phong_loss(&device).render(
        Tensor::full([1, 1, SIZE, SIZE], 40.0, &device),
        facing(&device),
    );

    let pred_depth = Tensor::<TestBackend, 4>::full([1, 1, SIZE, SIZE], 30.0, &device).require_grad();
    let pred_normals = facing(&device).mul_scalar(0.5).require_grad();
    let output = DepthOutput {
        depth: vec![pred_depth.clone()],
        normals: Some(pred_normals.clone()),
    };
    let terms = loss.compute(&output, &batch(40.0, Some(gt_phong), &device), 1).unwrap();

    // every term is still computed for logging
    assert!(terms.phong.is_some());
    assert!(terms.normals.is_some());

    let grads = terms.total.backward();
    assert!(pred_depth.grad(&grads).is_some());
    assert!(pred_normals.grad(&grads).is_none());
}

#[test]
fn test_phong_term_matches_rendered_ground_truth() {
    let device = Default::default();
    let loss = DepthLoss::new(only(1.0, 0.0), Some(phong_loss(&device)));
    // ground truth is rendered from raw depth in metres
    let gt_phong = phong_loss(&device)
        .renderer()
        .render(Tensor::full([1, 1, SIZE, SIZE], 0.04, &device), facing(&device));

    let output = DepthOutput {
        depth: vec![Tensor::full([1, 1, SIZE, SIZE], 40.0, &device)],
        normals: Some(facing(&device)),
    };
    let terms = loss
        .compute(&output, &batch(40.0, Some(gt_phong.clone()), &device), 0)
        .unwrap();
    let value: f32 = terms.phong.unwrap().into_scalar();
    assert!(value.abs() < 1e-5, "expected zero photometric loss, got {value}");

    // attenuation makes the shading depend on distance, not only direction
    let pred_depth = Tensor::<TestBackend, 4>::full([1, 1, SIZE, SIZE], 20.0, &device).require_grad();
    let pred_normals = facing(&device).require_grad();
    let output = DepthOutput {
        depth: vec![pred_depth.clone()],
        normals: Some(pred_normals.clone()),
    };
    let terms = loss.compute(&output, &batch(40.0, Some(gt_phong), &device), 0).unwrap();
    let total: f32 = terms.total.clone().into_scalar();
    assert!(total > 0.0);

    let grads = terms.total.backward();
    assert!(pred_depth.grad(&grads).is_some());
    assert!(pred_normals.grad(&grads).is_some());
}

#[test]
fn test_gradient_term_starts_after_first_epoch() {
    let device = Default::default();
    let weights = LossWeights {
        depth: 0.0,
        gradient: 1.0,
        normals: 0.0,
        regularization: 0.0,
        phong: 0.0,
    };
    let loss = DepthLoss::<TestBackend>::new(weights, None);
    let ramp = Tensor::<TestBackend, 1, Int>::arange(0..(SIZE * SIZE) as i64, &device)
        .float()
        .reshape([1, 1, SIZE, SIZE]);
    let target = DepthBatch {
        depth: Some(ramp),
        ..batch(0.0, None, &device)
    };
    let output = DepthOutput {
        depth: vec![Tensor::full([1, 1, SIZE, SIZE], 5.0, &device)],
        normals: None,
    };

    let first: f32 = loss.compute(&output, &target, 0).unwrap().gradient.into_scalar();
    let later: f32 = loss.compute(&output, &target, 1).unwrap().gradient.into_scalar();
    assert_eq!(first, 0.0);
    assert!(later > 0.0);
}

#[test]
fn test_configured_phong_needs_shading_channel() {
    let device = Default::default();
    let loss = DepthLoss::new(LossWeights::default(), Some(phong_loss(&device)));
    let output = DepthOutput {
        depth: vec![Tensor::full([1, 1, SIZE, SIZE], 40.0, &device)],
        normals: Some(facing(&device)),
    };
    let err = loss.compute(&output, &batch(40.0, None, &device), 0).unwrap_err();
    assert!(matches!(
        err,
        CystoDepthError::ChannelArity { channel: "phong", .. }
    ));
}
