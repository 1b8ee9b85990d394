//! Optimizer construction and learning-rate scheduling.
//!
//! Training runs in up to two phases. During warmup a dedicated optimizer
//! instance is stepped with a linearly increasing learning rate. After
//! warmup a second, independent instance takes over and its learning rate
//! is driven by [`ReduceOnPlateau`]. Optimizer state (Adam moments, SGD
//! momentum) does not carry over between the two instances.

use std::collections::HashMap;
use std::fmt;

use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::momentum::MomentumConfig;
use burn::optim::{AdamConfig, AdamWConfig, GradientsParams, Optimizer, SgdConfig};
use burn::tensor::backend::AutodiffBackend;

use crate::config::{OptimizerKind, PlateauMode, TrainingConfig};

/// One optimizer step: `(learning rate, module, gradients) -> module`.
pub type StepFn<M> = Box<dyn FnMut(f64, M, GradientsParams) -> M>;

fn boxed<M, B, O>(mut optimizer: O) -> StepFn<M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + 'static,
    O: Optimizer<M, B> + 'static,
{
    Box::new(move |lr, module, grads| optimizer.step(lr, module, grads))
}

/// Plateau scheduler settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateauSpec {
    /// Validation metric that drives the schedule.
    pub monitor: String,
    /// Whether the metric should decrease or increase.
    pub mode: PlateauMode,
    /// Non-improving checks tolerated before reducing.
    pub patience: usize,
    /// Multiplier applied on reduction.
    pub factor: f64,
    /// Validations between checks.
    pub frequency: usize,
    /// Floor of the learning rate.
    pub min_lr: f64,
}

/// Everything needed to build the optimizers of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerSpec {
    /// Update rule.
    pub kind: OptimizerKind,
    /// Base learning rate.
    pub lr: f64,
    /// Weight decay (decoupled for AdamW).
    pub weight_decay: f32,
    /// SGD momentum.
    pub momentum: f64,
    /// Length of the warmup phase in optimizer steps; 0 disables it.
    pub warmup_batches: usize,
    /// Main-phase scheduler.
    pub plateau: PlateauSpec,
}

impl OptimizerSpec {
    /// Spec described by a training configuration.
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            kind: config.optimizer,
            lr: config.lr,
            weight_decay: config.weight_decay,
            momentum: config.momentum,
            warmup_batches: config.warmup_batches,
            plateau: PlateauSpec {
                monitor: config.lr_scheduler_monitor.clone(),
                mode: config.lr_scheduler_mode,
                patience: config.lr_scheduler_patience,
                factor: config.lr_scheduler_factor,
                frequency: config.lr_scheduler_frequency,
                min_lr: config.min_lr,
            },
        }
    }

    /// A fresh optimizer instance with no state.
    pub fn build<M, B>(&self) -> StepFn<M>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B> + 'static,
    {
        let decay = (self.weight_decay > 0.0).then(|| WeightDecayConfig::new(self.weight_decay));
        match self.kind {
            OptimizerKind::Adam => boxed::<M, B, _>(
                AdamConfig::new()
                    .with_weight_decay(decay)
                    .init::<B, M>(),
            ),
            OptimizerKind::AdamW => boxed::<M, B, _>(
                AdamWConfig::new()
                    .with_weight_decay(self.weight_decay)
                    .init::<B, M>(),
            ),
            OptimizerKind::Sgd => {
                let momentum = (self.momentum > 0.0)
                    .then(|| MomentumConfig::new().with_momentum(self.momentum));
                boxed::<M, B, _>(
                    SgdConfig::new()
                        .with_weight_decay(decay)
                        .with_momentum(momentum)
                        .init::<B, M>(),
                )
            }
        }
    }

    /// Scheduler for the main phase.
    pub fn schedule(&self) -> ReduceOnPlateau {
        ReduceOnPlateau::new(self.lr, &self.plateau)
    }
}

/// Linear warmup multiplier `min(1, (step + 1) / warmup_batches)`.
pub fn warmup_multiplier(step: usize, warmup_batches: usize) -> f64 {
    if warmup_batches == 0 {
        return 1.0;
    }
    ((step + 1) as f64 / warmup_batches as f64).min(1.0)
}

const RELATIVE_THRESHOLD: f64 = 1e-4;

/// Reduce the learning rate when a monitored metric stops improving.
///
/// Only every `frequency`-th reported value is considered. Once more than
/// `patience` considered values pass without a relative improvement the
/// rate is multiplied by `factor`, never going below `min_lr`.
#[derive(Debug, Clone)]
pub struct ReduceOnPlateau {
    lr: f64,
    spec: PlateauSpec,
    best: Option<f64>,
    bad_checks: usize,
    reports: usize,
}

impl ReduceOnPlateau {
    /// Scheduler starting at `lr`.
    pub fn new(lr: f64, spec: &PlateauSpec) -> Self {
        Self {
            lr,
            spec: spec.clone(),
            best: None,
            bad_checks: 0,
            reports: 0,
        }
    }

    /// Current learning rate.
    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Name of the monitored metric.
    pub fn monitor(&self) -> &str {
        &self.spec.monitor
    }

    /// Best value seen so far.
    pub fn best(&self) -> Option<f64> {
        self.best
    }

    fn improves(&self, value: f64) -> bool {
        match (self.best, self.spec.mode) {
            (None, _) => true,
            (Some(best), PlateauMode::Min) => value < best - RELATIVE_THRESHOLD * best.abs(),
            (Some(best), PlateauMode::Max) => value > best + RELATIVE_THRESHOLD * best.abs(),
        }
    }

    /// Report a metric value and return the (possibly reduced) rate.
    pub fn step_metric(&mut self, value: f64) -> f64 {
        self.reports += 1;
        if self.reports % self.spec.frequency.max(1) != 0 || !value.is_finite() {
            return self.lr;
        }
        if self.improves(value) {
            self.best = Some(value);
            self.bad_checks = 0;
            return self.lr;
        }
        self.bad_checks += 1;
        if self.bad_checks > self.spec.patience {
            let reduced = (self.lr * self.spec.factor).max(self.spec.min_lr);
            if reduced < self.lr {
                log::info!(
                    "{} plateaued, reducing learning rate {:.3e} -> {:.3e}",
                    self.spec.monitor,
                    self.lr,
                    reduced
                );
            }
            self.lr = reduced;
            self.bad_checks = 0;
        }
        self.lr
    }
}

/// Which optimizer is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Warmup optimizer with the linear ramp.
    Warmup,
    /// Main optimizer with plateau scheduling.
    Main,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Warmup => write!(f, "warmup"),
            Phase::Main => write!(f, "main"),
        }
    }
}

/// The warmup and main optimizers plus their schedules.
pub struct OptimizerSchedule<M> {
    warmup: Option<StepFn<M>>,
    main: StepFn<M>,
    warmup_batches: usize,
    base_lr: f64,
    plateau: ReduceOnPlateau,
    steps: usize,
}

impl<M> fmt::Debug for OptimizerSchedule<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizerSchedule")
            .field("phase", &self.phase())
            .field("steps", &self.steps)
            .field("lr", &self.lr())
            .field("plateau", &self.plateau)
            .finish()
    }
}

impl<M> OptimizerSchedule<M> {
    /// Build both optimizer instances from `spec`.
    pub fn new<B>(spec: &OptimizerSpec) -> Self
    where
        B: AutodiffBackend,
        M: AutodiffModule<B> + 'static,
    {
        let warmup = (spec.warmup_batches > 0).then(|| spec.build::<M, B>());
        Self {
            warmup,
            main: spec.build::<M, B>(),
            warmup_batches: spec.warmup_batches,
            base_lr: spec.lr,
            plateau: spec.schedule(),
            steps: 0,
        }
    }

    /// Optimizer steps taken.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Restore the step counter when resuming.
    pub fn set_steps(&mut self, steps: usize) {
        self.steps = steps;
    }

    /// Active phase.
    pub fn phase(&self) -> Phase {
        if self.warmup.is_some() && self.steps < self.warmup_batches {
            Phase::Warmup
        } else {
            Phase::Main
        }
    }

    /// Learning rate of the next step.
    pub fn lr(&self) -> f64 {
        match self.phase() {
            Phase::Warmup => self.base_lr * warmup_multiplier(self.steps, self.warmup_batches),
            Phase::Main => self.plateau.lr(),
        }
    }

    /// The main-phase scheduler.
    pub fn plateau(&self) -> &ReduceOnPlateau {
        &self.plateau
    }

    /// Apply one update with the active optimizer.
    pub fn step(&mut self, module: M, grads: GradientsParams) -> M {
        let lr = self.lr();
        let module = match (self.phase(), self.warmup.as_mut()) {
            (Phase::Warmup, Some(warmup)) => warmup(lr, module, grads),
            _ => (self.main)(lr, module, grads),
        };
        self.steps += 1;
        if self.warmup.is_some() && self.steps == self.warmup_batches {
            log::info!("warmup finished after {} steps, switching optimizer", self.steps);
        }
        module
    }

    /// Feed validation metrics to the plateau scheduler. Ignored during
    /// warmup or when the monitored metric is absent.
    pub fn on_validation(&mut self, metrics: &HashMap<String, f32>) {
        if self.phase() == Phase::Warmup {
            return;
        }
        match metrics.get(self.plateau.monitor()) {
            Some(value) => {
                self.plateau.step_metric(f64::from(*value));
            }
            None => log::warn!(
                "monitored metric {} missing from validation results",
                self.plateau.monitor()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plateau(patience: usize, frequency: usize, mode: PlateauMode) -> ReduceOnPlateau {
        ReduceOnPlateau::new(
            0.1,
            &PlateauSpec {
                monitor: "val_rmse".into(),
                mode,
                patience,
                factor: 0.5,
                frequency,
                min_lr: 0.01,
            },
        )
    }

    #[test]
    fn test_warmup_multiplier() {
        assert_eq!(warmup_multiplier(0, 4), 0.25);
        assert_eq!(warmup_multiplier(3, 4), 1.0);
        assert_eq!(warmup_multiplier(10, 4), 1.0);
        assert_eq!(warmup_multiplier(0, 0), 1.0);
    }

    #[test]
    fn test_plateau_reduces_after_patience() {
        let mut s = plateau(3, 1, PlateauMode::Min);
        for v in [10.0, 9.0, 8.0, 8.0, 8.0, 8.0] {
            assert_eq!(s.step_metric(v), 0.1);
        }
        assert_eq!(s.step_metric(8.0), 0.05);
        assert_eq!(s.best(), Some(8.0));
    }

    #[test]
    fn test_plateau_waits_past_patience() {
        let mut s = plateau(2, 1, PlateauMode::Min);
        let lrs: Vec<f64> = [1.0, 1.0, 1.0, 1.0]
            .into_iter()
            .map(|v| s.step_metric(v))
            .collect();
        assert_eq!(lrs, vec![0.1, 0.1, 0.1, 0.05]);

        // zero patience reduces on every non-improving check
        let mut s = plateau(0, 1, PlateauMode::Min);
        assert_eq!(s.step_metric(1.0), 0.1);
        assert_eq!(s.step_metric(1.0), 0.05);
        assert_eq!(s.step_metric(1.0), 0.025);
    }

    #[test]
    fn test_plateau_max_mode_and_floor() {
        let mut s = plateau(1, 1, PlateauMode::Max);
        s.step_metric(0.5);
        s.step_metric(0.7);
        assert_eq!(s.lr(), 0.1);
        s.step_metric(0.7);
        assert_eq!(s.lr(), 0.1);
        s.step_metric(0.7);
        assert_eq!(s.lr(), 0.05);
        for _ in 0..10 {
            s.step_metric(0.1);
        }
        assert_eq!(s.lr(), 0.01);
    }

    #[test]
    fn test_plateau_frequency() {
        let mut s = plateau(1, 2, PlateauMode::Min);
        s.step_metric(1.0); // skipped
        s.step_metric(1.0); // best
        s.step_metric(5.0); // skipped
        assert_eq!(s.lr(), 0.1);
        s.step_metric(5.0); // first miss
        s.step_metric(5.0); // skipped
        assert_eq!(s.lr(), 0.1);
        s.step_metric(5.0);
        assert_eq!(s.lr(), 0.05);
    }

    #[test]
    fn test_spec_from_config() {
        let config = TrainingConfig::new()
            .with_warmup_batches(5)
            .with_lr_scheduler_patience(2);
        let spec = OptimizerSpec::from_config(&config);
        assert_eq!(spec.warmup_batches, 5);
        assert_eq!(spec.plateau.patience, 2);
        assert_eq!(spec.plateau.monitor, "val_rmse");
        assert_eq!(spec.schedule().lr(), config.lr);
    }
}
