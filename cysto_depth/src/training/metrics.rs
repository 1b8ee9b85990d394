//! Depth metrics and the sink that receives scalars and figures.

use std::path::{Path, PathBuf};

use burn::prelude::*;
use cysto_core::Image;
use cysto_io::save_image;

use crate::convert::to_vec;
use crate::error::Result;

/// Receives training scalars and figures.
///
/// Implementations decide where values end up; the trainer only reports.
pub trait MetricsSink {
    /// Record a named scalar at `step`.
    fn log_scalar(&mut self, name: &str, value: f32, step: usize);

    /// Record a figure (a CHW image with values in `[0, 1]`) at `step`.
    ///
    /// # Errors
    /// Returns an error if the figure cannot be stored.
    fn log_figure(&mut self, tag: &str, figure: &Image, step: usize) -> Result<()>;
}

/// Forwards scalars to the `log` facade and drops figures.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl MetricsSink for LogSink {
    fn log_scalar(&mut self, name: &str, value: f32, step: usize) {
        log::info!("step={step} {name}={value:.6}");
    }

    fn log_figure(&mut self, tag: &str, figure: &Image, step: usize) -> Result<()> {
        log::debug!("step={step} figure {tag} {:?} dropped", figure.shape());
        Ok(())
    }
}

/// Keeps everything in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    /// `(name, value, step)` in arrival order.
    pub scalars: Vec<(String, f32, usize)>,
    /// `(tag, figure, step)` in arrival order.
    pub figures: Vec<(String, Image, usize)>,
}

impl MemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Values logged under `name`, in order.
    pub fn values(&self, name: &str) -> Vec<f32> {
        self.scalars
            .iter()
            .filter(|(n, _, _)| n == name)
            .map(|(_, v, _)| *v)
            .collect()
    }

    /// Most recent value logged under `name`.
    pub fn last(&self, name: &str) -> Option<f32> {
        self.values(name).last().copied()
    }
}

impl MetricsSink for MemorySink {
    fn log_scalar(&mut self, name: &str, value: f32, step: usize) {
        self.scalars.push((name.to_string(), value, step));
    }

    fn log_figure(&mut self, tag: &str, figure: &Image, step: usize) -> Result<()> {
        self.figures.push((tag.to_string(), figure.clone(), step));
        Ok(())
    }
}

/// Writes figures as `<dir>/<tag>-<step>.png`; scalars go to the log.
#[derive(Debug, Clone)]
pub struct FigureDirSink {
    dir: PathBuf,
}

impl FigureDirSink {
    /// Sink writing into `dir` (created on first figure).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl MetricsSink for FigureDirSink {
    fn log_scalar(&mut self, name: &str, value: f32, step: usize) {
        LogSink.log_scalar(name, value, step);
    }

    fn log_figure(&mut self, tag: &str, figure: &Image, step: usize) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{tag}-{step:06}.png"));
        save_image(figure, &path)?;
        log::debug!("wrote {}", path.display());
        Ok(())
    }
}

/// Standard monocular depth metrics over valid (`gt > 0`) pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DepthMetrics {
    /// Mean `|pred - gt| / gt`.
    pub abs_rel: f32,
    /// Mean `(pred - gt)² / gt`.
    pub sq_rel: f32,
    /// Root mean squared error.
    pub rmse: f32,
    /// Root mean squared log error.
    pub rmse_log: f32,
    /// Fraction with `max(pred/gt, gt/pred) < 1.25`.
    pub delta1: f32,
    /// Same with `1.25²`.
    pub delta2: f32,
    /// Same with `1.25³`.
    pub delta3: f32,
}

impl DepthMetrics {
    /// Metrics named `<prefix>_<metric>`.
    pub fn named(&self, prefix: &str) -> Vec<(String, f32)> {
        [
            ("abs_rel", self.abs_rel),
            ("sq_rel", self.sq_rel),
            ("rmse", self.rmse),
            ("rmse_log", self.rmse_log),
            ("delta1", self.delta1),
            ("delta2", self.delta2),
            ("delta3", self.delta3),
        ]
        .into_iter()
        .map(|(name, v)| (format!("{prefix}_{name}"), v))
        .collect()
    }
}

const LOG_EPS: f64 = 1e-6;

/// Accumulates [`DepthMetrics`] over many batches, weighting every valid
/// pixel equally.
#[derive(Debug, Clone, Default)]
pub struct DepthMetricsAccumulator {
    abs_rel: f64,
    sq_rel: f64,
    sq_err: f64,
    sq_log_err: f64,
    delta: [u64; 3],
    count: u64,
}

impl DepthMetricsAccumulator {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of valid pixels seen so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Add host values; pixels with `gt <= 0` are ignored.
    pub fn update_values(&mut self, pred: &[f32], gt: &[f32]) {
        for (&p, &g) in pred.iter().zip(gt) {
            if g <= 0.0 {
                continue;
            }
            let (p, g) = (f64::from(p), f64::from(g));
            let diff = p - g;
            self.abs_rel += diff.abs() / g;
            self.sq_rel += diff * diff / g;
            self.sq_err += diff * diff;
            let log_diff = p.max(LOG_EPS).ln() - g.ln();
            self.sq_log_err += log_diff * log_diff;
            let ratio = (p / g).max(g / p.max(LOG_EPS));
            for (k, threshold) in [1.25, 1.25f64.powi(2), 1.25f64.powi(3)].iter().enumerate() {
                if ratio < *threshold {
                    self.delta[k] += 1;
                }
            }
            self.count += 1;
        }
    }

    /// Add a prediction/ground-truth batch of equal shape.
    ///
    /// # Errors
    /// Returns [`crate::CystoDepthError::Data`] if a tensor cannot be read.
    pub fn update<B: Backend>(&mut self, pred: Tensor<B, 4>, gt: Tensor<B, 4>) -> Result<()> {
        let pred = to_vec(pred)?;
        let gt = to_vec(gt)?;
        self.update_values(&pred, &gt);
        Ok(())
    }

    /// Metrics over everything seen; all zero when no pixel was valid.
    pub fn finish(&self) -> DepthMetrics {
        if self.count == 0 {
            return DepthMetrics::default();
        }
        let n = self.count as f64;
        DepthMetrics {
            abs_rel: (self.abs_rel / n) as f32,
            sq_rel: (self.sq_rel / n) as f32,
            rmse: (self.sq_err / n).sqrt() as f32,
            rmse_log: (self.sq_log_err / n).sqrt() as f32,
            delta1: (self.delta[0] as f64 / n) as f32,
            delta2: (self.delta[1] as f64 / n) as f32,
            delta3: (self.delta[2] as f64 / n) as f32,
        }
    }
}
