//! The interface between a model and the training driver.

use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use cysto_io::Stage;

use super::metrics::MetricsSink;
use super::optimizer::OptimizerSpec;
use crate::data::DepthBatch;
use crate::error::Result;

/// Result of one training step.
#[derive(Debug, Clone)]
pub struct StepOutput<B: Backend> {
    /// Scalar loss to backpropagate.
    pub loss: Tensor<B, 1>,
    /// Named values to log.
    pub scalars: Vec<(&'static str, f32)>,
}

/// Metric name prefix of a stage (`train`, `val`, `test`).
pub fn metric_prefix(stage: Stage) -> &'static str {
    match stage {
        Stage::Train => "train",
        Stage::Validate => "val",
        Stage::Test => "test",
    }
}

/// A task the [`super::Trainer`] can optimize.
///
/// The task owns losses, metric state and figure caches; the driver owns
/// the model, the optimizers, device placement and the epoch loop.
pub trait Trainable<B: AutodiffBackend> {
    /// The trained network.
    type Model: AutodiffModule<B> + 'static;
    /// Network output.
    type Output;

    /// Run the network on a batch.
    fn forward(&self, model: &Self::Model, batch: &DepthBatch<B>) -> Self::Output;

    /// Loss of one training batch at `epoch`.
    ///
    /// # Errors
    /// Returns an error if the batch lacks channels the loss needs.
    fn compute_loss(&self, model: &Self::Model, batch: &DepthBatch<B>, epoch: usize) -> Result<StepOutput<B>>;

    /// Accumulate evaluation metrics for one validation or test batch.
    ///
    /// # Errors
    /// Returns an error if the batch lacks ground truth or cannot be read.
    fn evaluate(
        &mut self,
        model: &<Self::Model as AutodiffModule<B>>::InnerModule,
        batch: &DepthBatch<B::InnerBackend>,
        batch_idx: usize,
        stage: Stage,
    ) -> Result<()>;

    /// Metrics of the evaluation pass that just ended, named with the stage
    /// prefix. Resets the accumulated state.
    fn finish_evaluation(&mut self, stage: Stage) -> Vec<(String, f32)>;

    /// Send comparison figures of the cached evaluation samples to `sink`.
    ///
    /// # Errors
    /// Returns an error if a figure cannot be produced or stored.
    fn plot(
        &mut self,
        model: &<Self::Model as AutodiffModule<B>>::InnerModule,
        stage: Stage,
        step: usize,
        sink: &mut dyn MetricsSink,
    ) -> Result<()>;

    /// Optimizers and schedules to train with.
    fn configure_optimizers(&self) -> OptimizerSpec;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_prefix() {
        assert_eq!(metric_prefix(Stage::Validate), "val");
        assert_eq!(metric_prefix(Stage::Test), "test");
        assert_eq!(metric_prefix(Stage::Train), "train");
    }
}
