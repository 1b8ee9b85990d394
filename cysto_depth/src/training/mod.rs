//! Training infrastructure for depth and normals estimation.
//!
//! This module provides:
//! - [`Trainable`]: the seam between a task and the epoch loop
//! - [`DepthEstimationTask`]: losses, depth metrics and figures
//! - [`Trainer`]: accumulation, optimizer phases, validation, checkpoints
//! - Checkpoint save/load, including non-strict transfer for resuming
//! - Metrics sinks and comparison figures

mod checkpoint;
mod metrics;
mod optimizer;
mod plot;
mod task;
mod trainable;
mod trainer;

pub use checkpoint::{
    checkpoint_dir_name, checkpoint_exists, find_latest_checkpoint, load_checkpoint, load_partial,
    save_checkpoint, transfer_parameters, CheckpointMetadata, TransferReport,
};
pub use metrics::{
    DepthMetrics, DepthMetricsAccumulator, FigureDirSink, LogSink, MemorySink, MetricsSink,
};
pub use optimizer::{
    warmup_multiplier, OptimizerSchedule, OptimizerSpec, Phase, PlateauSpec, ReduceOnPlateau,
    StepFn,
};
pub use plot::{depth_figure, depth_to_rgb, normals_figure, normals_to_rgb, phong_figure};
pub use task::DepthEstimationTask;
pub use trainable::{metric_prefix, StepOutput, Trainable};
pub use trainer::{EpochSummary, FitOutcome, Trainer};
