//! Checkpoint save/load and non-strict weight transfer.
//!
//! A checkpoint is a directory holding
//! - `model.mpk`: network weights (burn named MessagePack, full precision)
//! - `config.json`: the [`DepthModelConfig`] the weights belong to
//! - `metadata.json`: training progress as [`CheckpointMetadata`]

use std::fs;
use std::path::{Path, PathBuf};

use burn::config::Config;
use burn::module::{Module, ModuleMapper, ModuleVisitor, ParamId};
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use serde::{Deserialize, Serialize};

use crate::config::DepthModelConfig;
use crate::error::{CystoDepthError, Result};
use crate::nn::DepthNormalModel;

const MODEL_FILE: &str = "model";
const CONFIG_FILE: &str = "config.json";
const METADATA_FILE: &str = "metadata.json";
const CHECKPOINT_VERSION: u32 = 1;

fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
}

/// Training progress stored next to the weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Epochs completed.
    pub epoch: usize,
    /// Optimizer steps taken.
    pub global_step: usize,
    /// Name of the monitored metric.
    pub monitor: String,
    /// Its latest value, if a validation ran.
    pub monitor_value: Option<f32>,
    /// Checkpoint format version.
    pub version: u32,
}

impl CheckpointMetadata {
    /// Metadata for the current format.
    pub fn new(
        epoch: usize,
        global_step: usize,
        monitor: impl Into<String>,
        monitor_value: Option<f32>,
    ) -> Self {
        Self {
            epoch,
            global_step,
            monitor: monitor.into(),
            monitor_value,
            version: CHECKPOINT_VERSION,
        }
    }
}

/// Directory name used for the checkpoint after `epoch`.
pub fn checkpoint_dir_name(epoch: usize) -> String {
    format!("epoch-{epoch:04}")
}

/// Save weights, model configuration and metadata into `dir`.
///
/// # Errors
/// Returns [`CystoDepthError::Fs`], [`CystoDepthError::Json`] or
/// [`CystoDepthError::Recorder`].
pub fn save_checkpoint<B: Backend>(
    dir: &Path,
    model: &DepthNormalModel<B>,
    config: &DepthModelConfig,
    metadata: &CheckpointMetadata,
) -> Result<()> {
    fs::create_dir_all(dir)?;
    model.clone().save_file(dir.join(MODEL_FILE), &recorder())?;
    config.save(dir.join(CONFIG_FILE))?;
    fs::write(dir.join(METADATA_FILE), serde_json::to_string_pretty(metadata)?)?;
    log::info!(
        "saved checkpoint to {} (epoch {}, step {})",
        dir.display(),
        metadata.epoch,
        metadata.global_step
    );
    Ok(())
}

/// Whether `dir` holds a complete checkpoint.
pub fn checkpoint_exists(dir: &Path) -> bool {
    dir.join(format!("{MODEL_FILE}.mpk")).is_file()
        && dir.join(CONFIG_FILE).is_file()
        && dir.join(METADATA_FILE).is_file()
}

/// Load a checkpoint into a model built from its own stored configuration.
///
/// # Errors
/// Returns [`CystoDepthError::Checkpoint`] for incomplete directories or
/// unreadable configuration, and recorder or JSON errors otherwise.
pub fn load_checkpoint<B: Backend>(
    dir: &Path,
    device: &B::Device,
) -> Result<(DepthNormalModel<B>, DepthModelConfig, CheckpointMetadata)> {
    if !checkpoint_exists(dir) {
        return Err(CystoDepthError::Checkpoint {
            message: format!("{} is not a complete checkpoint", dir.display()),
        });
    }
    let config =
        DepthModelConfig::load(dir.join(CONFIG_FILE)).map_err(|e| CystoDepthError::Checkpoint {
            message: format!("model config: {e}"),
        })?;
    let metadata: CheckpointMetadata =
        serde_json::from_str(&fs::read_to_string(dir.join(METADATA_FILE))?)?;
    if metadata.version > CHECKPOINT_VERSION {
        return Err(CystoDepthError::Checkpoint {
            message: format!("unsupported checkpoint version {}", metadata.version),
        });
    }
    let model = config
        .init::<B>(device)
        .load_file(dir.join(MODEL_FILE), &recorder(), device)?;
    log::info!(
        "loaded checkpoint from {} (epoch {}, step {})",
        dir.display(),
        metadata.epoch,
        metadata.global_step
    );
    Ok((model, config, metadata))
}

/// Most recent `epoch-NNNN` checkpoint below `base_dir`.
pub fn find_latest_checkpoint(base_dir: &Path) -> Option<PathBuf> {
    fs::read_dir(base_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| checkpoint_exists(path))
        .filter_map(|path| {
            let epoch = path
                .file_name()?
                .to_str()?
                .strip_prefix("epoch-")?
                .parse::<usize>()
                .ok()?;
            Some((epoch, path))
        })
        .max_by_key(|(epoch, _)| *epoch)
        .map(|(_, path)| path)
}

/// Outcome of a non-strict transfer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferReport {
    /// Parameters copied from the checkpoint.
    pub copied: usize,
    /// Parameters or components left at their fresh values, with reasons.
    pub skipped: Vec<String>,
}

struct Collector {
    params: Vec<TensorData>,
}

impl<B: Backend> ModuleVisitor<B> for Collector {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.params.push(tensor.to_data());
    }
}

struct Transfer<'a> {
    component: &'static str,
    source: &'a [TensorData],
    position: usize,
    report: &'a mut TransferReport,
}

impl<B: Backend> ModuleMapper<B> for Transfer<'_> {
    fn map_float<const D: usize>(&mut self, _id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        let position = self.position;
        self.position += 1;
        let shape = tensor.dims().to_vec();
        match self.source.get(position) {
            Some(data) if data.shape == shape => {
                self.report.copied += 1;
                let require_grad = tensor.is_require_grad();
                Tensor::from_data(data.clone(), &tensor.device()).set_require_grad(require_grad)
            }
            Some(data) => {
                self.report.skipped.push(format!(
                    "{}[{position}]: shape {:?} in checkpoint, {shape:?} in model",
                    self.component, data.shape
                ));
                tensor
            }
            None => {
                self.report
                    .skipped
                    .push(format!("{}[{position}]: absent in checkpoint", self.component));
                tensor
            }
        }
    }
}

fn transfer_component<B: Backend, M: Module<B>>(
    component: &'static str,
    source: &M,
    target: M,
    report: &mut TransferReport,
) -> M {
    let mut collector = Collector { params: Vec::new() };
    source.visit(&mut collector);
    let mut transfer = Transfer {
        component,
        source: &collector.params,
        position: 0,
        report,
    };
    target.map(&mut transfer)
}

/// Copy parameters from `source` into `target` component by component
/// (encoder, depth decoder, normals decoder), matching parameters by
/// position and skipping any whose shape differs. Components missing on
/// either side are skipped whole. Every skip is logged.
pub fn transfer_parameters<B: Backend>(
    source: &DepthNormalModel<B>,
    mut target: DepthNormalModel<B>,
) -> (DepthNormalModel<B>, TransferReport) {
    let mut report = TransferReport::default();
    target.encoder = transfer_component("encoder", &source.encoder, target.encoder, &mut report);
    target.depth_decoder = transfer_component(
        "depth_decoder",
        &source.depth_decoder,
        target.depth_decoder,
        &mut report,
    );
    target.normals_decoder = match (&source.normals_decoder, target.normals_decoder) {
        (Some(s), Some(t)) => Some(transfer_component("normals_decoder", s, t, &mut report)),
        (None, Some(t)) => {
            report
                .skipped
                .push("normals_decoder: absent in checkpoint".to_string());
            Some(t)
        }
        (Some(_), None) => {
            report
                .skipped
                .push("normals_decoder: absent in model".to_string());
            None
        }
        (None, None) => None,
    };
    for reason in &report.skipped {
        log::warn!("checkpoint transfer skipped {reason}");
    }
    (target, report)
}

/// Load the checkpoint in `dir` and transfer what fits into a fresh model
/// built from `config`.
///
/// # Errors
/// Propagates [`load_checkpoint`] errors.
pub fn load_partial<B: Backend>(
    dir: &Path,
    config: &DepthModelConfig,
    device: &B::Device,
) -> Result<(DepthNormalModel<B>, CheckpointMetadata, TransferReport)> {
    let (stored, _, metadata) = load_checkpoint::<B>(dir, device)?;
    let (model, report) = transfer_parameters(&stored, config.init(device));
    log::info!(
        "resumed {} parameters from {} ({} skipped)",
        report.copied,
        dir.display(),
        report.skipped.len()
    );
    Ok((model, metadata, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::to_vec;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn config() -> DepthModelConfig {
        DepthModelConfig::new()
            .with_encoder_channels(vec![4, 8])
            .with_num_scales(2)
    }

    fn predict(model: &DepthNormalModel<TestBackend>) -> Vec<f32> {
        let input = Tensor::ones([1, 3, 8, 8], &Default::default());
        let out = model.forward(input);
        to_vec(out.finest_depth().unwrap().clone()).unwrap()
    }

    #[test]
    fn test_metadata_json_roundtrip() {
        let meta = CheckpointMetadata::new(3, 120, "val_rmse", Some(4.5));
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(serde_json::from_str::<CheckpointMetadata>(&json).unwrap(), meta);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let model = config().init::<TestBackend>(&device);
        let meta = CheckpointMetadata::new(1, 10, "val_rmse", None);
        save_checkpoint(dir.path(), &model, &config(), &meta).unwrap();
        assert!(checkpoint_exists(dir.path()));

        let (loaded, loaded_config, loaded_meta) =
            load_checkpoint::<TestBackend>(dir.path(), &device).unwrap();
        assert_eq!(loaded_meta, meta);
        assert_eq!(loaded_config.encoder_channels, vec![4, 8]);
        assert_eq!(predict(&loaded), predict(&model));
    }

    #[test]
    fn test_incomplete_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_checkpoint::<TestBackend>(dir.path(), &Default::default()).unwrap_err();
        assert!(matches!(err, CystoDepthError::Checkpoint { .. }));
    }

    #[test]
    fn test_transfer_skips_mismatches_and_absent_components() {
        let device = Default::default();
        let source = config().init::<TestBackend>(&device);
        // merged decoder: no normals decoder and 4-channel depth heads
        let target = config().with_merged_decoder(true).init::<TestBackend>(&device);
        let (merged, report) = transfer_parameters(&source, target);
        assert!(merged.normals_decoder.is_none());
        assert!(report.copied > 0);
        assert!(report.skipped.iter().any(|s| s.starts_with("normals_decoder: absent in model")));
        assert!(report.skipped.iter().any(|s| s.starts_with("depth_decoder[")));

        // identical architecture copies everything
        let fresh = config().init::<TestBackend>(&device);
        let (copy, report) = transfer_parameters(&source, fresh);
        assert!(report.skipped.is_empty());
        assert_eq!(predict(&copy), predict(&source));
    }

    fn params<M: Module<TestBackend>>(module: &M) -> Vec<TensorData> {
        let mut collector = Collector { params: Vec::new() };
        module.visit(&mut collector);
        collector.params
    }

    #[test]
    fn test_partial_resume_into_different_head() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let merged = config().with_merged_decoder(true);
        let stored = merged.init::<TestBackend>(&device);
        let meta = CheckpointMetadata::new(4, 40, "val_rmse", Some(2.0));
        save_checkpoint(dir.path(), &stored, &merged, &meta).unwrap();

        let (resumed, loaded_meta, report) =
            load_partial::<TestBackend>(dir.path(), &config(), &device).unwrap();
        assert_eq!(loaded_meta, meta);
        assert!(resumed.normals_decoder.is_some());
        assert_eq!(params(&resumed.encoder), params(&stored.encoder));
        assert!(report
            .skipped
            .iter()
            .any(|s| s == "normals_decoder: absent in checkpoint"));

        // parameters without a counterpart keep their initialisation
        let (reloaded, _, _) = load_checkpoint::<TestBackend>(dir.path(), &device).unwrap();
        let target = config().init::<TestBackend>(&device);
        let fresh_normals = params(target.normals_decoder.as_ref().unwrap());
        let fresh_depth = params(&target.depth_decoder);
        let (transferred, _) = transfer_parameters(&reloaded, target);
        assert_eq!(
            params(transferred.normals_decoder.as_ref().unwrap()),
            fresh_normals
        );

        let source_depth = params(&stored.depth_decoder);
        let mut restored = 0;
        let mut kept = 0;
        for ((got, fresh), source) in params(&transferred.depth_decoder)
            .iter()
            .zip(&fresh_depth)
            .zip(&source_depth)
        {
            if source.shape == fresh.shape {
                assert_eq!(got, source);
                restored += 1;
            } else {
                assert_eq!(got, fresh);
                kept += 1;
            }
        }
        // shared upsampling restored, 4-channel heads rejected
        assert!(restored > 0);
        assert!(kept > 0);
    }

    #[test]
    fn test_find_latest_checkpoint() {
        let base = tempfile::tempdir().unwrap();
        let device = Default::default();
        let model = config().init::<TestBackend>(&device);
        for epoch in [2, 10, 7] {
            let dir = base.path().join(checkpoint_dir_name(epoch));
            let meta = CheckpointMetadata::new(epoch, 0, "val_rmse", None);
            save_checkpoint(&dir, &model, &config(), &meta).unwrap();
        }
        fs::create_dir_all(base.path().join("epoch-0099")).unwrap();
        let latest = find_latest_checkpoint(base.path()).unwrap();
        assert!(latest.ends_with("epoch-0010"));
    }
}
