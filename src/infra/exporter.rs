// ============================================================
// Layer 6 — Artifact Exporter
// ============================================================
// Writes everything a downstream consumer needs once training
// has finished, and reads it back for inference.
//
//   <output_dir>/
//     train_config.json            run + architecture settings
//     tumor_classifier.mpk         weights (Burn CompactRecorder)
//     tumor_classifier.graph.json  portable computation graph
//     class_map.json               index ↔ class name
//     validation_report.txt        final classification report
//
// Nothing here is called until the training loop has completed,
// so a failed run leaves no half-written model behind.
//
// The config is saved separately from the weights because the
// weights alone cannot rebuild the architecture: the inferencer
// needs image size, filter count and hidden width first.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::domain::{
    class_map::ClassMap,
    error::TrainError,
    metrics::ValidationReport,
    shape::{feature_map_shape, LayerShape, CONV_STAGES},
};
use crate::infra::graph_export::build_graph;
use crate::ml::model::{Mode, TumorClassifier};

pub const CONFIG_FILE: &str    = "train_config.json";
/// CompactRecorder appends its own `.mpk` extension
pub const WEIGHTS_STEM: &str   = "tumor_classifier";
pub const WEIGHTS_FILE: &str   = "tumor_classifier.mpk";
pub const GRAPH_FILE: &str     = "tumor_classifier.graph.json";
pub const CLASS_MAP_FILE: &str = "class_map.json";
pub const REPORT_FILE: &str    = "validation_report.txt";

/// Paths of the two model blobs written by `export_model`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedArtifacts {
    pub weights: PathBuf,
    pub graph:   PathBuf,
}

/// Reads and writes the model artifacts of one output directory.
#[derive(Debug, Clone)]
pub struct ArtifactExporter {
    dir: PathBuf,
}

impl ArtifactExporter {
    /// The directory is only created on the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create output directory '{}'", self.dir.display()))
    }

    fn write_json<T: serde::Serialize>(&self, file: &str, value: &T) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.dir.join(file);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Wrote '{}'", path.display());
        Ok(path)
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, file: &str) -> Result<T> {
        let path = self.dir.join(file);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read '{}'. Make sure you have run 'train' before 'predict'.",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed JSON in '{}'", path.display()))
    }

    // ─── Config ──────────────────────────────────────────────────────────────

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        self.write_json(CONFIG_FILE, cfg).map(|_| ())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        self.read_json(CONFIG_FILE)
    }

    // ─── Model ───────────────────────────────────────────────────────────────

    /// Export the weights and the portable graph.
    ///
    /// One evaluation-mode forward pass on a zero tensor of
    /// `sample_input_shape` ([batch, channels, height, width]) runs
    /// first; its logits must come out as [batch, num_classes].
    pub fn export_model<B: Backend>(
        &self,
        model:              &TumorClassifier<B>,
        sample_input_shape: [usize; 4],
    ) -> Result<ExportedArtifacts> {
        let [batch, channels, height, width] = sample_input_shape;
        let device = model.fc2.weight.device();

        // ── Probe ────────────────────────────────────────────────────────────
        // Check the shape analytically first; a mismatched resolution would
        // otherwise fail inside the reshape.
        let [_, in_channels, _, _] = model.conv1.weight.dims();
        let [out_channels, _, _, _] = model.conv4.weight.dims();
        let features = feature_map_shape(LayerShape::new(height, width), CONV_STAGES)?;
        if channels != in_channels || features.area() * out_channels != model.num_flatten {
            return Err(TrainError::configuration(format!(
                "sample input {sample_input_shape:?} does not fit a model trained on {in_channels} channels \
                 with {} flattened features",
                model.num_flatten
            ))
            .into());
        }

        let sample = Tensor::<B, 4>::zeros(sample_input_shape, &device);
        let dims   = model.forward(sample, Mode::Eval).dims();
        if dims != [batch, model.num_classes()] {
            return Err(TrainError::configuration(format!(
                "sample forward produced {:?}, expected [{}, {}]",
                dims,
                batch,
                model.num_classes()
            ))
            .into());
        }

        self.ensure_dir()?;

        // ── Weights ──────────────────────────────────────────────────────────
        let stem = self.dir.join(WEIGHTS_STEM);
        CompactRecorder::new()
            .record(model.clone().into_record(), stem.clone())
            .with_context(|| format!("Failed to save weights to '{}'", stem.display()))?;

        // ── Graph ────────────────────────────────────────────────────────────
        let graph_path = self.dir.join(GRAPH_FILE);
        build_graph(model, channels, height, width).write(&graph_path)?;

        let artifacts = ExportedArtifacts {
            weights: self.dir.join(WEIGHTS_FILE),
            graph:   graph_path,
        };
        tracing::info!(
            weights = %artifacts.weights.display(),
            graph   = %artifacts.graph.display(),
            "Model exported"
        );
        Ok(artifacts)
    }

    /// Load saved weights into a model of the matching architecture.
    pub fn load_model<B: Backend>(
        &self,
        model:  TumorClassifier<B>,
        device: &B::Device,
    ) -> Result<TumorClassifier<B>> {
        let stem   = self.dir.join(WEIGHTS_STEM);
        let record = CompactRecorder::new()
            .load(stem.clone(), device)
            .with_context(|| {
                format!("Cannot load weights '{}'. Have you trained the model first?", stem.display())
            })?;
        Ok(model.load_record(record))
    }

    // ─── Class map ───────────────────────────────────────────────────────────

    pub fn write_class_map(&self, class_map: &ClassMap) -> Result<()> {
        self.write_json(CLASS_MAP_FILE, class_map).map(|_| ())
    }

    pub fn load_class_map(&self) -> Result<ClassMap> {
        let map: ClassMap = self.read_json(CLASS_MAP_FILE)?;
        map.validate()?;
        Ok(map)
    }

    // ─── Report ──────────────────────────────────────────────────────────────

    pub fn write_report(&self, report: &ValidationReport) -> Result<()> {
        self.ensure_dir()?;
        let path = self.dir.join(REPORT_FILE);
        let text = format!(
            "validation loss: {:.4}\nvalidation accuracy: {:.4}\nmacro f1: {:.4}\n\n{}\n",
            report.metrics.average_loss,
            report.metrics.accuracy,
            report.macro_f1(),
            report.report,
        );
        fs::write(&path, text)
            .with_context(|| format!("Cannot write report to '{}'", path.display()))?;
        Ok(())
    }
}
