//! Depth (and normals) estimation as a [`Trainable`] task.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use cysto_io::Stage;

use super::metrics::{DepthMetricsAccumulator, MetricsSink};
use super::optimizer::OptimizerSpec;
use super::plot::{depth_figure, normals_figure, phong_figure};
use super::trainable::{metric_prefix, StepOutput, Trainable};
use crate::config::{CystoDepthConfig, PhongConfig, TrainingConfig};
use crate::convert::{batch_to_images, to_scalar};
use crate::data::DepthBatch;
use crate::error::Result;
use crate::loss::{DepthLoss, LossWeights, PhongLoss};
use crate::nn::{DepthNormalModel, DepthOutput};
use crate::render::PhongRenderer;

/// Evaluation losses are computed as in any epoch after the first, so the
/// gradient term is always included.
const EVAL_EPOCH: usize = 1;

/// Trains a [`DepthNormalModel`] with [`DepthLoss`] and evaluates it with
/// standard depth metrics.
#[derive(Debug)]
pub struct DepthEstimationTask<B: AutodiffBackend> {
    loss: DepthLoss<B>,
    eval_loss: DepthLoss<B::InnerBackend>,
    spec: OptimizerSpec,
    max_plot_samples: usize,
    metrics: DepthMetricsAccumulator,
    eval_loss_sum: f64,
    eval_batches: usize,
    plot_batch: Option<DepthBatch<B::InnerBackend>>,
}

impl<B: AutodiffBackend> DepthEstimationTask<B> {
    /// Depth-only task; the photometric term is off until
    /// [`DepthEstimationTask::with_phong`] is called.
    pub fn new(training: &TrainingConfig) -> Self {
        let weights = LossWeights::from_config(training);
        Self {
            loss: DepthLoss::new(weights, None),
            eval_loss: DepthLoss::new(weights, None),
            spec: OptimizerSpec::from_config(training),
            max_plot_samples: training.max_plot_samples,
            metrics: DepthMetricsAccumulator::new(),
            eval_loss_sum: 0.0,
            eval_batches: 0,
            plot_batch: None,
        }
    }

    /// Enable the photometric loss for `size`×`size` inputs.
    ///
    /// # Errors
    /// Returns [`crate::CystoDepthError::InvalidConfig`] for bad intrinsics.
    pub fn with_phong(
        mut self,
        phong: &PhongConfig,
        size: usize,
        depth_scale: f32,
        device: &B::Device,
    ) -> Result<Self> {
        let weights = self.loss.weights();
        let renderer = PhongRenderer::<B>::from_config(phong, size, device)?;
        self.loss = DepthLoss::new(weights, Some(PhongLoss::new(renderer, depth_scale)));
        let renderer = PhongRenderer::<B::InnerBackend>::from_config(phong, size, device)?;
        self.eval_loss = DepthLoss::new(weights, Some(PhongLoss::new(renderer, depth_scale)));
        Ok(self)
    }

    /// Task for a full experiment configuration. The photometric loss is
    /// enabled when normals are predicted and a normals directory is set.
    ///
    /// # Errors
    /// Returns [`crate::CystoDepthError::InvalidConfig`] for bad intrinsics.
    pub fn from_config(config: &CystoDepthConfig, device: &B::Device) -> Result<Self> {
        let task = Self::new(&config.training);
        if config.model.predict_normals && config.normals_dir.is_some() {
            task.with_phong(
                &config.phong,
                config.data.image_size,
                config.data.depth_scale,
                device,
            )
        } else {
            Ok(task)
        }
    }

    /// The training objective.
    pub fn loss(&self) -> &DepthLoss<B> {
        &self.loss
    }

    fn reset_evaluation(&mut self) {
        self.metrics = DepthMetricsAccumulator::new();
        self.eval_loss_sum = 0.0;
        self.eval_batches = 0;
    }

    fn cache_plot_batch(&mut self, batch: &DepthBatch<B::InnerBackend>) {
        let n = batch.len().min(self.max_plot_samples);
        if n == 0 {
            return;
        }
        let take = |t: &Tensor<B::InnerBackend, 4>| t.clone().narrow(0, 0, n);
        self.plot_batch = Some(DepthBatch {
            color: take(&batch.color),
            phong: batch.phong.as_ref().map(take),
            depth: batch.depth.as_ref().map(take),
            normals: batch.normals.as_ref().map(take),
            indices: batch.indices[..n].to_vec(),
        });
    }
}

impl<B: AutodiffBackend> Trainable<B> for DepthEstimationTask<B> {
    type Model = DepthNormalModel<B>;
    type Output = DepthOutput<B>;

    fn forward(&self, model: &Self::Model, batch: &DepthBatch<B>) -> Self::Output {
        model.forward(batch.color.clone())
    }

    fn compute_loss(&self, model: &Self::Model, batch: &DepthBatch<B>, epoch: usize) -> Result<StepOutput<B>> {
        let output = self.forward(model, batch);
        let terms = self.loss.compute(&output, batch, epoch)?;
        let scalars = terms.scalars()?;
        Ok(StepOutput {
            loss: terms.total,
            scalars,
        })
    }

    fn evaluate(
        &mut self,
        model: &DepthNormalModel<B::InnerBackend>,
        batch: &DepthBatch<B::InnerBackend>,
        batch_idx: usize,
        stage: Stage,
    ) -> Result<()> {
        if batch_idx == 0 {
            self.reset_evaluation();
            if stage == Stage::Validate && self.plot_batch.is_none() {
                self.cache_plot_batch(batch);
            }
        }
        let output = model.forward(batch.color.clone());
        let terms = self.eval_loss.compute(&output, batch, EVAL_EPOCH)?;
        self.eval_loss_sum += f64::from(to_scalar(terms.total)?);
        self.eval_batches += 1;

        if let Some(fine) = output.finest_depth() {
            self.metrics
                .update(fine.clone(), batch.require_depth("depth metrics")?)?;
        }
        Ok(())
    }

    fn finish_evaluation(&mut self, stage: Stage) -> Vec<(String, f32)> {
        let prefix = metric_prefix(stage);
        let mut out = self.metrics.finish().named(prefix);
        if self.eval_batches > 0 {
            let mean = self.eval_loss_sum / self.eval_batches as f64;
            out.push((format!("{prefix}_loss"), mean as f32));
        }
        self.reset_evaluation();
        out
    }

    fn plot(
        &mut self,
        model: &DepthNormalModel<B::InnerBackend>,
        stage: Stage,
        step: usize,
        sink: &mut dyn MetricsSink,
    ) -> Result<()> {
        let Some(batch) = &self.plot_batch else {
            return Ok(());
        };
        let prefix = metric_prefix(stage);
        let output = model.forward(batch.color.clone());
        let inputs = batch_to_images(batch.color.clone())?;

        if let (Some(pred), Some(gt)) = (output.finest_depth(), &batch.depth) {
            let pred = batch_to_images(pred.clone())?;
            let gt = batch_to_images(gt.clone())?;
            for (i, ((input, p), g)) in inputs.iter().zip(&pred).zip(&gt).enumerate() {
                sink.log_figure(&format!("{prefix}-depth-{i}"), &depth_figure(input, p, g)?, step)?;
            }
        }

        if let (Some(pred), Some(gt)) = (&output.normals, &batch.normals) {
            let pred_images = batch_to_images(pred.clone())?;
            let gt_images = batch_to_images(gt.clone())?;
            for (i, ((input, p), g)) in inputs.iter().zip(&pred_images).zip(&gt_images).enumerate() {
                sink.log_figure(&format!("{prefix}-normals-{i}"), &normals_figure(input, p, g)?, step)?;
            }

            let shading = self.eval_loss.phong().zip(output.finest_depth());
            if let (Some((loss, depth)), Some(gt_phong)) = (shading, &batch.phong) {
                let rendered = batch_to_images(loss.render(depth.clone(), pred.clone()))?;
                let gt_phong = batch_to_images(gt_phong.clone())?;
                for (i, ((input, p), g)) in inputs.iter().zip(&rendered).zip(&gt_phong).enumerate() {
                    sink.log_figure(&format!("{prefix}-phong-{i}"), &phong_figure(input, p, g)?, step)?;
                }
            }
        }
        Ok(())
    }

    fn configure_optimizers(&self) -> OptimizerSpec {
        self.spec.clone()
    }
}
