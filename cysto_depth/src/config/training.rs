//! Loss weighting, optimisation and run-control configuration.

use std::fmt;
use std::str::FromStr;

use burn::config::Config;
use serde::{Deserialize, Serialize};

/// Optimisation algorithm used by both the warmup and the main phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    /// Adam.
    #[default]
    Adam,
    /// Adam with decoupled weight decay.
    AdamW,
    /// Stochastic gradient descent with momentum.
    Sgd,
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Adam => "adam",
            Self::AdamW => "adamw",
            Self::Sgd => "sgd",
        })
    }
}

impl FromStr for OptimizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "adam" => Ok(Self::Adam),
            "adamw" => Ok(Self::AdamW),
            "sgd" => Ok(Self::Sgd),
            other => Err(format!("unknown optimizer '{other}'")),
        }
    }
}

/// Whether the monitored metric should decrease or increase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlateauMode {
    /// Lower is better (errors).
    #[default]
    Min,
    /// Higher is better (threshold accuracies).
    Max,
}

/// Configuration of loss weights, optimisers and the training run.
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// Weight of the multi-scale BerHu depth loss.
    #[config(default = 1.0)]
    pub depth_loss_factor: f32,

    /// Weight of the depth gradient loss (active from the second epoch).
    #[config(default = 0.5)]
    pub depth_grad_loss_factor: f32,

    /// Weight of the cosine normals loss.
    #[config(default = 1.0)]
    pub normals_loss_factor: f32,

    /// Weight of the unit-length normals regularisation.
    #[config(default = 1.0)]
    pub normals_regularization_factor: f32,

    /// Weight of the Phong re-rendering loss.
    #[config(default = 1.0)]
    pub phong_loss_factor: f32,

    /// Optimisation algorithm.
    #[config(default = "OptimizerKind::Adam")]
    pub optimizer: OptimizerKind,

    /// Base learning rate.
    #[config(default = 1e-3)]
    pub lr: f64,

    /// Weight decay.
    #[config(default = 0.0)]
    pub weight_decay: f32,

    /// SGD momentum.
    #[config(default = 0.9)]
    pub momentum: f64,

    /// Optimiser steps of the linear warmup phase (0 disables warmup).
    #[config(default = 0)]
    pub warmup_batches: usize,

    /// Batches whose gradients are summed before one optimiser step.
    #[config(default = 1)]
    pub accumulate_grad_batches: usize,

    /// Validation metric driving reduce-on-plateau.
    #[config(default = "String::from(\"val_rmse\")")]
    pub lr_scheduler_monitor: String,

    /// Direction of improvement of the monitored metric.
    #[config(default = "PlateauMode::Min")]
    pub lr_scheduler_mode: PlateauMode,

    /// Checks without improvement before the learning rate is reduced.
    #[config(default = 10)]
    pub lr_scheduler_patience: usize,

    /// Multiplier applied on each reduction.
    #[config(default = 0.1)]
    pub lr_scheduler_factor: f64,

    /// The scheduler looks at the monitored metric every this many validations.
    #[config(default = 1)]
    pub lr_scheduler_frequency: usize,

    /// Lower bound of the learning rate.
    #[config(default = 0.0)]
    pub min_lr: f64,

    /// Run validation every this many epochs.
    #[config(default = 1)]
    pub check_val_every_n_epoch: usize,

    /// Number of training epochs.
    #[config(default = 100)]
    pub max_epochs: usize,

    /// Checkpoint directory to resume weights from (non-strict).
    pub resume_from_checkpoint: Option<String>,

    /// Directory checkpoints are written to.
    #[config(default = "String::from(\"checkpoints\")")]
    pub checkpoint_dir: String,

    /// Samples cached for validation figures.
    #[config(default = 7)]
    pub max_plot_samples: usize,

    /// Log the running training loss every this many optimiser steps.
    #[config(default = 50)]
    pub log_every_n_steps: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        let factors = [
            self.depth_loss_factor,
            self.depth_grad_loss_factor,
            self.normals_loss_factor,
            self.normals_regularization_factor,
            self.phong_loss_factor,
        ];
        if factors.iter().any(|f| *f < 0.0) {
            return Err("loss factors must be non-negative".to_string());
        }
        if self.lr <= 0.0 {
            return Err("lr must be positive".to_string());
        }
        if self.accumulate_grad_batches == 0 {
            return Err("accumulate_grad_batches must be positive".to_string());
        }
        if !(0.0..1.0).contains(&self.lr_scheduler_factor) {
            return Err("lr_scheduler_factor must lie in [0, 1)".to_string());
        }
        if self.lr_scheduler_frequency == 0 || self.check_val_every_n_epoch == 0 {
            return Err("scheduler and validation frequencies must be positive".to_string());
        }
        if self.log_every_n_steps == 0 {
            return Err("log_every_n_steps must be positive".to_string());
        }
        Ok(())
    }
}
