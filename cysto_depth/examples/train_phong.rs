//! Example: train depth and normals with the Phong photometric loss.
//!
//! Reads an experiment configuration (or builds one from the directories
//! given on the command line), trains on the CPU backend, evaluates the
//! final model on the test split and writes validation figures if a figure
//! directory is set.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p cysto_depth --example train_phong -- \
//!     --color data/color --depth data/depth --normals data/normals \
//!     --epochs 20 --checkpoint-dir runs/exp1
//! ```

use std::error::Error;
use std::path::PathBuf;

use burn::backend::{Autodiff, NdArray};
use burn::config::Config;
use clap::Parser;

use cysto_depth::data::PhongDataModule;
use cysto_depth::training::{
    DepthEstimationTask, FigureDirSink, LogSink, MetricsSink, Trainer,
};
use cysto_depth::CystoDepthConfig;

type MyBackend = Autodiff<NdArray>;

#[derive(Parser, Debug)]
#[command(author, version, about = "Train endoscopic depth and normals with a Phong loss")]
struct Cli {
    /// Experiment configuration (JSON). Directory flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root of the colour images
    #[arg(long)]
    color: Option<String>,

    /// Root of the depth maps
    #[arg(long)]
    depth: Option<String>,

    /// Root of the normal maps
    #[arg(long)]
    normals: Option<String>,

    /// Override the number of epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Override the checkpoint directory
    #[arg(long)]
    checkpoint_dir: Option<String>,

    /// Resume from this checkpoint directory
    #[arg(long)]
    resume: Option<String>,

    /// Write the effective configuration here before training
    #[arg(long)]
    save_config: Option<PathBuf>,
}

fn experiment(cli: &Cli) -> Result<CystoDepthConfig, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => CystoDepthConfig::load(path)?,
        None => {
            let (Some(color), Some(depth)) = (&cli.color, &cli.depth) else {
                return Err("either --config or both --color and --depth are required".into());
            };
            CystoDepthConfig::new(color.clone(), depth.clone())
        }
    };
    if let Some(color) = &cli.color {
        config.color_dir = color.clone();
    }
    if let Some(depth) = &cli.depth {
        config.depth_dir = depth.clone();
    }
    if cli.normals.is_some() {
        config.normals_dir = cli.normals.clone();
    }
    if let Some(epochs) = cli.epochs {
        config.training.max_epochs = epochs;
    }
    if let Some(dir) = &cli.checkpoint_dir {
        config.training.checkpoint_dir = dir.clone();
    }
    if cli.resume.is_some() {
        config.training.resume_from_checkpoint = cli.resume.clone();
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let config = experiment(&cli)?;
    config.validate()?;
    if let Some(path) = &cli.save_config {
        config.save(path)?;
        log::info!("wrote configuration to {}", path.display());
    }

    let device = burn::backend::ndarray::NdArrayDevice::Cpu;
    let data = PhongDataModule::<NdArray>::from_config(&config, device)?;
    let mut task = DepthEstimationTask::<MyBackend>::from_config(&config, &device)?;
    let trainer = Trainer::<MyBackend>::new(config.training.clone(), config.model.clone(), device);

    let mut sink: Box<dyn MetricsSink> = match &config.figure_dir {
        Some(dir) => Box::new(FigureDirSink::new(dir)),
        None => Box::new(LogSink),
    };

    let outcome = trainer.fit(&mut task, &data, sink.as_mut())?;
    for summary in &outcome.history {
        println!(
            "epoch {:>4}  train_loss {:.5}  lr {:.2e}",
            summary.epoch, summary.train_loss, summary.lr
        );
    }

    let test = trainer.test(&mut task, &outcome.model, &data, outcome.global_step, sink.as_mut())?;
    for (name, value) in test {
        println!("{name:<12} {value:.5}");
    }
    Ok(())
}
