// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `predict`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, enums, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use crate::application::train_use_case::{ComputeDevice, TrainConfig};

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the tumor classifier on a folder-per-class image directory
    Train(TrainArgs),

    /// Classify one image with a trained model
    Predict(PredictArgs),
}

/// Backend selection on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceArg {
    /// GPU through WebGPU
    Wgpu,
    /// CPU (ndarray)
    Cpu,
}

impl From<DeviceArg> for ComputeDevice {
    fn from(d: DeviceArg) -> Self {
        match d {
            DeviceArg::Wgpu => ComputeDevice::Wgpu,
            DeviceArg::Cpu  => ComputeDevice::Cpu,
        }
    }
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory with one sub-directory of images per class
    #[arg(long, default_value = "public/Brain Tumor Data Set")]
    pub data_dir: String,

    /// Separate validation directory with the same class folders.
    /// Without it, --val-split of --data-dir is held out.
    #[arg(long)]
    pub val_dir: Option<String>,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 5)]
    pub epochs: usize,

    /// Number of images processed together in one step
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 3e-4)]
    pub lr: f64,

    /// Where weights, graph, class map and report are written
    #[arg(long, default_value = "public/model")]
    pub output_dir: String,

    /// Images are resized to this square size (minimum 46)
    #[arg(long, default_value_t = 256)]
    pub image_size: usize,

    /// Filters in the first conv block; doubled in each of the next three
    #[arg(long, default_value_t = 8)]
    pub initial_filters: usize,

    /// Width of the hidden fully-connected layer
    #[arg(long, default_value_t = 100)]
    pub hidden: usize,

    /// Dropout probability before the output layer
    #[arg(long, default_value_t = 0.25)]
    pub dropout: f64,

    /// Fraction of --data-dir held out for validation
    #[arg(long, default_value_t = 0.2)]
    pub val_split: f64,

    /// Seed for the train/validation split and loader shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, value_enum, default_value_t = DeviceArg::Wgpu)]
    pub device: DeviceArg,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// This is the boundary between Layer 1 and Layer 2 —
/// the application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:        a.data_dir,
            val_dir:         a.val_dir,
            output_dir:      a.output_dir,
            epochs:          a.epochs,
            batch_size:      a.batch_size,
            lr:              a.lr,
            image_size:      a.image_size,
            initial_filters: a.initial_filters,
            hidden:          a.hidden,
            dropout:         a.dropout,
            val_split:       a.val_split,
            seed:            a.seed,
            device:          a.device.into(),
        }
    }
}

/// All arguments for the `predict` command
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Image file to classify
    #[arg(long)]
    pub image: PathBuf,

    /// Directory written by `train`
    #[arg(long, default_value = "public/model")]
    pub model_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = DeviceArg::Wgpu)]
    pub device: DeviceArg,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["tumor-classifier", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        assert_eq!(TrainConfig::from(args), TrainConfig::default());
    }

    #[test]
    fn test_train_flags() {
        let cli = Cli::try_parse_from([
            "tumor-classifier", "train",
            "--data-dir", "scans",
            "--val-dir", "held_out",
            "--epochs", "3",
            "--device", "cpu",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = TrainConfig::from(args);
        assert_eq!(cfg.data_dir, "scans");
        assert_eq!(cfg.val_dir.as_deref(), Some("held_out"));
        assert_eq!(cfg.epochs, 3);
        assert_eq!(cfg.device, ComputeDevice::Cpu);
    }

    #[test]
    fn test_predict_requires_image() {
        assert!(Cli::try_parse_from(["tumor-classifier", "predict"]).is_err());
    }
}
