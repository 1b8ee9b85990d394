//! The epoch loop.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use burn::module::AutodiffModule;
use burn::optim::{GradientsAccumulator, GradientsParams};
use burn::tensor::backend::AutodiffBackend;
use cysto_io::Stage;

use super::checkpoint::{checkpoint_dir_name, load_partial, save_checkpoint, CheckpointMetadata};
use super::metrics::MetricsSink;
use super::optimizer::OptimizerSchedule;
use super::trainable::Trainable;
use crate::config::{DepthModelConfig, TrainingConfig};
use crate::convert::to_scalar;
use crate::data::{BatchLoader, DataModule};
use crate::error::{CystoDepthError, Result};
use crate::nn::DepthNormalModel;

/// What happened in one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    /// Zero-based epoch index.
    pub epoch: usize,
    /// Mean training loss over the epoch's batches.
    pub train_loss: f32,
    /// Learning rate after the epoch.
    pub lr: f64,
    /// Validation metrics, empty when validation did not run.
    pub validation: Vec<(String, f32)>,
    /// Checkpoint written after the epoch.
    pub checkpoint: PathBuf,
}

/// Result of [`Trainer::fit`].
#[derive(Debug)]
pub struct FitOutcome<B: AutodiffBackend> {
    /// The trained network.
    pub model: DepthNormalModel<B>,
    /// Optimizer steps taken, including those of a resumed run.
    pub global_step: usize,
    /// One entry per epoch run.
    pub history: Vec<EpochSummary>,
}

/// Drives training, validation and testing of a [`Trainable`] task.
///
/// Handles device placement, gradient accumulation, the warmup/main
/// optimizer switch, plateau scheduling, the validation cadence,
/// checkpointing and metric logging.
#[derive(Debug)]
pub struct Trainer<B: AutodiffBackend> {
    config: TrainingConfig,
    model_config: DepthModelConfig,
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Create a trainer placing everything on `device`.
    pub fn new(config: TrainingConfig, model_config: DepthModelConfig, device: B::Device) -> Self {
        Self {
            config,
            model_config,
            device,
        }
    }

    /// Training settings.
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Target device.
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Fresh network, or one resumed from `resume_from_checkpoint`.
    ///
    /// Resuming is non-strict: parameters that do not fit the configured
    /// network are skipped. Returns the model, the first epoch to run and
    /// the global step reached so far.
    ///
    /// # Errors
    /// Propagates checkpoint loading errors.
    pub fn initial_model(&self) -> Result<(DepthNormalModel<B>, usize, usize)> {
        match &self.config.resume_from_checkpoint {
            Some(dir) => {
                let (model, metadata, _) =
                    load_partial::<B>(Path::new(dir), &self.model_config, &self.device)?;
                Ok((model, metadata.epoch + 1, metadata.global_step))
            }
            None => Ok((self.model_config.init::<B>(&self.device), 0, 0)),
        }
    }

    /// Train for `max_epochs`, validating every `check_val_every_n_epoch`
    /// epochs and checkpointing after every epoch.
    ///
    /// # Errors
    /// Returns data, loss, checkpoint or figure errors as they occur.
    pub fn fit<T, D>(&self, task: &mut T, data: &D, sink: &mut dyn MetricsSink) -> Result<FitOutcome<B>>
    where
        T: Trainable<B, Model = DepthNormalModel<B>>,
        D: DataModule,
    {
        let (mut model, start_epoch, global_step) = self.initial_model()?;
        let spec = task.configure_optimizers();
        let monitor = spec.plateau.monitor.clone();
        let mut schedule = OptimizerSchedule::<DepthNormalModel<B>>::new::<B>(&spec);
        schedule.set_steps(global_step);

        let train_loader = data.loader(Stage::Train)?;
        if train_loader.is_empty() {
            return Err(CystoDepthError::config("training split is empty"));
        }
        let val_loader = match data.manifest().len(Stage::Validate) {
            0 => {
                log::warn!("validation split is empty, plateau scheduling is inactive");
                None
            }
            _ => Some(data.loader(Stage::Validate)?),
        };

        log::info!(
            "training epochs {}..{} with {} batches each, {} optimizer",
            start_epoch,
            self.config.max_epochs,
            train_loader.num_batches(),
            spec.kind
        );

        let mut history = Vec::new();
        for epoch in start_epoch..self.config.max_epochs {
            let (trained, train_loss) =
                self.train_epoch(task, model, &train_loader, &mut schedule, epoch, sink)?;
            model = trained;
            let step = schedule.steps();
            sink.log_scalar("train_epoch_loss", train_loss, step);

            let validate = (epoch + 1) % self.config.check_val_every_n_epoch.max(1) == 0;
            let validation = match (&val_loader, validate) {
                (Some(loader), true) => {
                    let valid = model.valid();
                    let metrics = self.evaluate(task, &valid, loader, Stage::Validate, epoch, step, sink)?;
                    let lookup: HashMap<String, f32> = metrics.iter().cloned().collect();
                    schedule.on_validation(&lookup);
                    task.plot(&valid, Stage::Validate, step, sink)?;
                    metrics
                }
                _ => Vec::new(),
            };

            let monitor_value = validation
                .iter()
                .find(|(name, _)| *name == monitor)
                .map(|(_, v)| *v);
            let dir = Path::new(&self.config.checkpoint_dir).join(checkpoint_dir_name(epoch));
            let metadata = CheckpointMetadata::new(epoch, step, monitor.clone(), monitor_value);
            save_checkpoint(&dir, &model, &self.model_config, &metadata)?;

            log::info!(
                "epoch {epoch}: train_loss={train_loss:.6} lr={:.3e} phase={}{}",
                schedule.lr(),
                schedule.phase(),
                monitor_value
                    .map(|v| format!(" {monitor}={v:.6}"))
                    .unwrap_or_default()
            );
            history.push(EpochSummary {
                epoch,
                train_loss,
                lr: schedule.lr(),
                validation,
                checkpoint: dir,
            });
        }

        Ok(FitOutcome {
            model,
            global_step: schedule.steps(),
            history,
        })
    }

    /// Evaluate `model` on the test split.
    ///
    /// # Errors
    /// Returns data or metric errors.
    pub fn test<T, D>(
        &self,
        task: &mut T,
        model: &DepthNormalModel<B>,
        data: &D,
        step: usize,
        sink: &mut dyn MetricsSink,
    ) -> Result<Vec<(String, f32)>>
    where
        T: Trainable<B, Model = DepthNormalModel<B>>,
        D: DataModule,
    {
        let loader = data.loader(Stage::Test)?;
        if loader.is_empty() {
            log::warn!("test split is empty");
            return Ok(Vec::new());
        }
        self.evaluate(task, &model.valid(), &loader, Stage::Test, 0, step, sink)
    }

    fn train_epoch<T>(
        &self,
        task: &mut T,
        mut model: DepthNormalModel<B>,
        loader: &BatchLoader,
        schedule: &mut OptimizerSchedule<DepthNormalModel<B>>,
        epoch: usize,
        sink: &mut dyn MetricsSink,
    ) -> Result<(DepthNormalModel<B>, f32)>
    where
        T: Trainable<B, Model = DepthNormalModel<B>>,
    {
        let accumulate = self.config.accumulate_grad_batches.max(1);
        let log_every = self.config.log_every_n_steps.max(1);
        let mut accumulator = GradientsAccumulator::<DepthNormalModel<B>>::new();
        let mut pending = 0;
        let mut loss_sum = 0.0f64;
        let mut batches = 0usize;

        for batch in loader.iter::<B>(epoch, &self.device) {
            let batch = batch?;
            let out = task.compute_loss(&model, &batch, epoch)?;
            loss_sum += f64::from(to_scalar(out.loss.clone())?);
            batches += 1;

            let grads = out.loss.div_scalar(accumulate as f32).backward();
            accumulator.accumulate(&model, GradientsParams::from_grads(grads, &model));
            pending += 1;
            if pending < accumulate {
                continue;
            }

            let lr = schedule.lr();
            model = schedule.step(model, accumulator.grads());
            pending = 0;
            let step = schedule.steps();
            if step % log_every == 0 {
                for (name, value) in &out.scalars {
                    sink.log_scalar(name, *value, step);
                }
                sink.log_scalar("lr", lr as f32, step);
            }
        }

        // flush a partial accumulation window at the end of the epoch
        if pending > 0 {
            model = schedule.step(model, accumulator.grads());
        }

        let mean = if batches == 0 {
            0.0
        } else {
            (loss_sum / batches as f64) as f32
        };
        Ok((model, mean))
    }

    #[allow(clippy::too_many_arguments)]
    fn evaluate<T>(
        &self,
        task: &mut T,
        model: &DepthNormalModel<B::InnerBackend>,
        loader: &BatchLoader,
        stage: Stage,
        epoch: usize,
        step: usize,
        sink: &mut dyn MetricsSink,
    ) -> Result<Vec<(String, f32)>>
    where
        T: Trainable<B, Model = DepthNormalModel<B>>,
    {
        for (batch_idx, batch) in loader.iter::<B::InnerBackend>(epoch, &self.device).enumerate() {
            task.evaluate(model, &batch?, batch_idx, stage)?;
        }
        let metrics = task.finish_evaluation(stage);
        for (name, value) in &metrics {
            sink.log_scalar(name, *value, step);
        }
        Ok(metrics)
    }
}
