// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate the configuration  (Layer 3 - domain)
//   Step 2: Scan the class folders      (Layer 4 - data)
//   Step 3: Hold out validation images  (Layer 4 - data)
//   Step 4: Decode images into datasets (Layer 4 - data)
//   Step 5: Train, select, export       (Layer 5 - ml, Layer 6 - infra)
//
// A bad configuration fails in step 1, before any file is read.
// Nothing is written to the output directory until step 5 has
// finished its epoch loop.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::ImageDataset,
    loader::ImageFolderLoader,
    preprocessor::Preprocessor,
    splitter::split_train_val,
};
use crate::domain::{
    error::TrainError,
    image_record::{class_counts, ImageRecord},
    traits::ImageSource,
};
use crate::infra::exporter::ArtifactExporter;
use crate::ml::model::TumorClassifierConfig;
use crate::ml::trainer::{run_training, TrainingSummary};

// ─── Compute Device ───────────────────────────────────────────────────────────
/// Which Burn backend the run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    /// Autodiff<Wgpu>: GPU through WebGPU (Vulkan / Metal / DX12)
    #[default]
    Wgpu,
    /// Autodiff<NdArray>: pure CPU
    Cpu,
}

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Serialisable so it can be saved next to the weights and reloaded
// for inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub data_dir:        String,
    /// Explicit validation folder; when unset, `val_split` of
    /// `data_dir` is held out instead
    pub val_dir:         Option<String>,
    pub output_dir:      String,
    pub epochs:          usize,
    pub batch_size:      usize,
    pub lr:              f64,
    /// Images are resized to image_size x image_size
    pub image_size:      usize,
    pub initial_filters: usize,
    pub hidden:          usize,
    pub dropout:         f64,
    pub val_split:       f64,
    pub seed:            u64,
    pub device:          ComputeDevice,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:        "public/Brain Tumor Data Set".to_string(),
            val_dir:         None,
            output_dir:      "public/model".to_string(),
            epochs:          5,
            batch_size:      32,
            lr:              3e-4,
            image_size:      256,
            initial_filters: 8,
            hidden:          100,
            dropout:         0.25,
            val_split:       0.2,
            seed:            42,
            device:          ComputeDevice::Wgpu,
        }
    }
}

impl TrainConfig {
    /// Architecture for a dataset with `num_classes` classes.
    pub fn model_config(&self, num_classes: usize) -> TumorClassifierConfig {
        TumorClassifierConfig::new(num_classes)
            .with_height(self.image_size)
            .with_width(self.image_size)
            .with_initial_filters(self.initial_filters)
            .with_hidden(self.hidden)
            .with_dropout(self.dropout)
    }

    /// Reject settings that could never train, before touching any data.
    pub fn validate(&self) -> Result<(), TrainError> {
        if self.epochs == 0 {
            return Err(TrainError::configuration("epochs must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(TrainError::configuration("batch size must be at least 1"));
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(TrainError::configuration(format!(
                "learning rate must be positive, got {}",
                self.lr
            )));
        }
        if self.val_dir.is_none() && !(self.val_split > 0.0 && self.val_split < 1.0) {
            return Err(TrainError::configuration(format!(
                "validation split must be in (0, 1), got {}",
                self.val_split
            )));
        }
        Preprocessor::new(self.image_size, self.image_size)?;
        // Class count is unknown yet; two is the minimum the model accepts
        self.model_config(2).validate()
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainingSummary> {
        let cfg = &self.config;

        // ── Step 1: Validate ─────────────────────────────────────────────────
        cfg.validate()?;

        // ── Step 2: Scan class folders ───────────────────────────────────────
        tracing::info!("Scanning images in '{}'", cfg.data_dir);
        let (class_map, records) = ImageFolderLoader::new(&cfg.data_dir).scan()?;
        if class_map.len() < 2 {
            return Err(TrainError::data(format!(
                "need at least two class folders in '{}', found {}",
                cfg.data_dir,
                class_map.len()
            ))
            .into());
        }

        // ── Step 3: Train / validation split ─────────────────────────────────
        let (train_records, val_records) = match &cfg.val_dir {
            Some(val_dir) => {
                let (val_map, val_records) = ImageFolderLoader::new(val_dir).scan()?;
                if val_map != class_map {
                    return Err(TrainError::data(format!(
                        "validation classes {:?} differ from training classes {:?}",
                        val_map.names(),
                        class_map.names()
                    ))
                    .into());
                }
                (records, val_records)
            }
            None => split_train_val(records, cfg.val_split, cfg.seed),
        };

        if train_records.is_empty() {
            return Err(TrainError::data("training set is empty").into());
        }
        log_split("train", &train_records, class_map.names());
        log_split("validation", &val_records, class_map.names());

        // ── Step 4: Decode into datasets ─────────────────────────────────────
        // Augmentation for training only
        let preprocessor  = Preprocessor::new(cfg.image_size, cfg.image_size)?;
        let train_dataset = ImageDataset::load(&train_records, preprocessor, true)?;
        let val_dataset   = ImageDataset::load(&val_records, preprocessor, false)?;

        // ── Step 5: Train and export (Layer 5 + 6) ───────────────────────────
        let exporter = ArtifactExporter::new(&cfg.output_dir);
        let summary  = run_training(cfg, train_dataset, val_dataset, &class_map, &exporter)?;

        tracing::info!(
            best_f1  = summary.best_f1,
            restored = summary.restored,
            "Training complete, artifacts in '{}'",
            cfg.output_dir
        );
        Ok(summary)
    }
}

fn log_split(name: &str, records: &[ImageRecord], class_names: &[String]) {
    let counts = class_counts(records, class_names.len());
    let detail: Vec<String> = class_names
        .iter()
        .zip(&counts)
        .map(|(c, n)| format!("{c}={n}"))
        .collect();
    tracing::info!("{} set: {} images ({})", name, records.len(), detail.join(", "));
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::{fs, path::Path};

    use crate::domain::class_map::ClassMap;
    use crate::infra::exporter::{CLASS_MAP_FILE, CONFIG_FILE, REPORT_FILE};

    /// Write `count` 48x48 PNGs per class; class 1 is brighter.
    fn write_class_folders(root: &Path, classes: &[&str], count: usize) {
        for (c, class) in classes.iter().enumerate() {
            let dir = root.join(class);
            fs::create_dir_all(&dir).unwrap();
            for i in 0..count {
                let base = if c == 0 { 30u8 } else { 200u8 };
                let img  = RgbImage::from_fn(48, 48, |x, y| {
                    let v = base.saturating_add(((x + y + i as u32) % 16) as u8);
                    Rgb([v, v, v])
                });
                img.save(dir.join(format!("img_{i}.png"))).unwrap();
            }
        }
    }

    fn small_config(root: &Path) -> TrainConfig {
        TrainConfig {
            data_dir:        root.join("train").display().to_string(),
            val_dir:         Some(root.join("val").display().to_string()),
            output_dir:      root.join("model").display().to_string(),
            epochs:          3,
            batch_size:      2,
            image_size:      48,
            initial_filters: 2,
            hidden:          8,
            device:          ComputeDevice::Cpu,
            ..TrainConfig::default()
        }
    }

    fn files_ending_with(dir: &Path, suffix: &str) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(suffix))
            .count()
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(TrainConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_json_round_trip() {
        let cfg  = TrainConfig { device: ComputeDevice::Cpu, ..TrainConfig::default() };
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"cpu\""));
        assert_eq!(serde_json::from_str::<TrainConfig>(&json).unwrap(), cfg);
    }

    #[test]
    fn test_tiny_image_size_is_configuration_error() {
        let cfg = TrainConfig { image_size: 8, ..TrainConfig::default() };
        // Fails before the (missing) data directory is ever looked at
        let err = TrainUseCase::new(cfg).execute().unwrap_err();
        assert!(matches!(err.downcast_ref::<TrainError>(), Some(TrainError::Configuration(_))));
    }

    #[test]
    fn test_zero_epochs_rejected() {
        let cfg = TrainConfig { epochs: 0, ..TrainConfig::default() };
        assert!(matches!(cfg.validate(), Err(TrainError::Configuration(_))));
    }

    #[test]
    fn test_missing_data_dir_is_data_error() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            data_dir:   tmp.path().join("nowhere").display().to_string(),
            output_dir: tmp.path().join("model").display().to_string(),
            device:     ComputeDevice::Cpu,
            ..TrainConfig::default()
        };
        let err = TrainUseCase::new(cfg).execute().unwrap_err();
        assert!(matches!(err.downcast_ref::<TrainError>(), Some(TrainError::Data(_))));
        assert!(!tmp.path().join("model").exists());
    }

    #[test]
    fn test_mismatched_validation_classes_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write_class_folders(&tmp.path().join("train"), &["no_tumor", "tumor"], 1);
        write_class_folders(&tmp.path().join("val"), &["benign", "tumor"], 1);

        let err = TrainUseCase::new(small_config(tmp.path())).execute().unwrap_err();
        assert!(matches!(err.downcast_ref::<TrainError>(), Some(TrainError::Data(_))));
    }

    #[test]
    fn test_end_to_end_two_classes() {
        let tmp = tempfile::tempdir().unwrap();
        write_class_folders(&tmp.path().join("train"), &["tumor", "no_tumor"], 5);
        write_class_folders(&tmp.path().join("val"), &["tumor", "no_tumor"], 2);

        let cfg     = small_config(tmp.path());
        let summary = TrainUseCase::new(cfg.clone()).execute().unwrap();

        assert_eq!(summary.history.len(), 3);
        assert_eq!(summary.history[0].train.samples, 10);
        assert_eq!(summary.history[0].validation.samples, 4);
        assert_eq!(summary.final_report.report.per_class.len(), 2);
        assert_eq!(summary.final_report.metrics.samples, 4);

        let out = Path::new(&cfg.output_dir);
        assert_eq!(files_ending_with(out, ".mpk"), 1);
        assert_eq!(files_ending_with(out, ".graph.json"), 1);
        assert!(out.join(CONFIG_FILE).exists());
        assert!(out.join(REPORT_FILE).exists());

        let json = fs::read_to_string(out.join(CLASS_MAP_FILE)).unwrap();
        let map: ClassMap = serde_json::from_str(&json).unwrap();
        assert_eq!(map.names(), ["no_tumor".to_string(), "tumor".to_string()]);
    }

    #[test]
    fn test_split_holds_out_fraction_of_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        write_class_folders(&tmp.path().join("train"), &["no", "yes"], 7);

        let cfg = TrainConfig {
            val_dir: None,
            epochs:  1,
            ..small_config(tmp.path())
        };
        let summary = TrainUseCase::new(cfg).execute().unwrap();
        // floor(14 * 0.2) = 2 validation images
        assert_eq!(summary.history[0].validation.samples, 2);
        assert_eq!(summary.history[0].train.samples, 12);
    }
}
