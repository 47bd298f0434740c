// ============================================================
// Layer 5 — Training Orchestrator
// ============================================================
// Runs the epoch loop, keeps the best checkpoint by validation
// macro-F1 and hands the final model to the exporter.
//
//   for epoch in 1..=epochs:
//     model   = train_epoch(model)             Autodiff backend
//     pass    = evaluate_epoch(model.valid())  inner backend
//     report  = classification report of pass
//     if report.macro_f1 > best.f1:            strictly greater
//       best  = snapshot(model)
//   model = best.record, or last-epoch model if none was taken
//   final = evaluate_epoch(model.valid())
//
// The snapshot is an owned record: later optimizer steps build
// new tensors and never touch it.
//
// Backends:
//   ComputeDevice::Wgpu → Autodiff<Wgpu>     (GPU, default)
//   ComputeDevice::Cpu  → Autodiff<NdArray>  (CPU, also used in tests)
//   model.valid() always yields the matching inner backend, so the
//   validation batcher is built for B::InnerBackend.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{Context, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{AdamConfig, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::sync::Arc;

use crate::application::train_use_case::{ComputeDevice, TrainConfig};
use crate::data::{
    batcher::{ImageBatch, ImageBatcher},
    dataset::ImageDataset,
    preprocessor::CHANNELS,
};
use crate::domain::{class_map::ClassMap, error::TrainError, metrics::ValidationReport};
use crate::infra::{
    exporter::{ArtifactExporter, ExportedArtifacts},
    metrics::{EpochSummary, MetricsLogger},
};
use crate::ml::{
    epoch::{evaluate_epoch, train_epoch},
    model::TumorClassifier,
};

type ModelRecord<B> = <TumorClassifier<B> as Module<B>>::Record;

// ─── BestCheckpoint ───────────────────────────────────────────────────────────
/// Highest validation macro-F1 seen so far and a snapshot of the
/// parameters that produced it.
pub struct BestCheckpoint<B: Backend> {
    f1_score: f64,
    record:   Option<ModelRecord<B>>,
}

impl<B: Backend> Default for BestCheckpoint<B> {
    fn default() -> Self {
        Self { f1_score: 0.0, record: None }
    }
}

impl<B: Backend> BestCheckpoint<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn f1_score(&self) -> f64 {
        self.f1_score
    }

    pub fn has_snapshot(&self) -> bool {
        self.record.is_some()
    }

    /// Snapshot `model` if `f1` strictly beats the current best.
    /// Returns whether the snapshot was replaced.
    pub fn offer(&mut self, f1: f64, model: &TumorClassifier<B>) -> bool {
        if f1 > self.f1_score {
            self.f1_score = f1;
            self.record   = Some(model.clone().into_record());
            true
        } else {
            false
        }
    }

    /// Load the snapshot into `model`. Without one, `model` comes back
    /// unchanged and the flag is false.
    pub fn restore(self, model: TumorClassifier<B>) -> (TumorClassifier<B>, bool) {
        match self.record {
            Some(record) => (model.load_record(record), true),
            None         => (model, false),
        }
    }
}

// ─── fit ──────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy)]
pub struct FitSettings {
    pub epochs: usize,
    pub lr:     f64,
}

pub struct TrainingOutcome<B: AutodiffBackend> {
    /// Best-checkpoint weights, or the last epoch's if none was taken
    pub model:        TumorClassifier<B>,
    pub best_f1:      f64,
    /// False when no epoch ever beat the initial best of 0.0
    pub restored:     bool,
    pub history:      Vec<EpochSummary>,
    pub final_report: ValidationReport,
}

/// Run the full epoch loop.
///
/// Fails with `TrainError::Data` before the first epoch if the
/// validation loader has no items.
pub fn fit<B, O>(
    settings:     FitSettings,
    mut model:    TumorClassifier<B>,
    mut optim:    O,
    train_loader: &dyn DataLoader<ImageBatch<B>>,
    val_loader:   &dyn DataLoader<ImageBatch<B::InnerBackend>>,
    class_names:  &[String],
    metrics_log:  Option<&MetricsLogger>,
) -> Result<TrainingOutcome<B>>
where
    B: AutodiffBackend,
    O: Optimizer<TumorClassifier<B>, B>,
{
    if val_loader.num_items() == 0 {
        return Err(TrainError::data("validation set is empty").into());
    }

    let mut best    = BestCheckpoint::<B>::new();
    let mut history = Vec::with_capacity(settings.epochs);

    for epoch in 1..=settings.epochs {
        // ── Training phase ────────────────────────────────────────────────────
        let (next, train_metrics) =
            train_epoch(model, &mut optim, train_loader.iter(), settings.lr, epoch)?;
        model = next;

        // ── Validation phase ──────────────────────────────────────────────────
        let pass   = evaluate_epoch(&model.valid(), val_loader.iter())?;
        let report = ValidationReport::new(pass.metrics, &pass.labels, &pass.predictions, class_names)?;

        let val_f1   = report.macro_f1();
        let improved = best.offer(val_f1, &model);

        let summary = EpochSummary {
            epoch,
            train:        train_metrics,
            validation:   report.metrics,
            val_macro_f1: val_f1,
            best_f1:      best.f1_score(),
            improved,
        };

        tracing::info!(
            epoch,
            epochs       = settings.epochs,
            train_loss   = train_metrics.average_loss,
            train_acc    = train_metrics.accuracy,
            val_loss     = report.metrics.average_loss,
            val_acc      = report.metrics.accuracy,
            val_macro_f1 = val_f1,
            best_f1      = best.f1_score(),
            improved,
            "Epoch complete"
        );

        if let Some(log) = metrics_log {
            log.log(&summary)?;
        }
        history.push(summary);
    }

    // ── Restore best weights ──────────────────────────────────────────────────
    let best_f1 = best.f1_score();
    let (model, restored) = best.restore(model);
    if restored {
        tracing::info!("Restored best checkpoint (macro-F1 {:.4})", best_f1);
    } else {
        tracing::warn!(
            "Validation macro-F1 never rose above 0.0; keeping the last epoch's weights"
        );
    }

    // ── Final report ──────────────────────────────────────────────────────────
    let pass         = evaluate_epoch(&model.valid(), val_loader.iter())?;
    let final_report = ValidationReport::new(pass.metrics, &pass.labels, &pass.predictions, class_names)?;
    tracing::info!("Final validation report:\n{}", final_report.report);

    Ok(TrainingOutcome { model, best_f1, restored, history, final_report })
}

// ─── run_training ─────────────────────────────────────────────────────────────
/// What a completed run leaves behind.
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub best_f1:      f64,
    pub restored:     bool,
    pub history:      Vec<EpochSummary>,
    pub final_report: ValidationReport,
    pub artifacts:    ExportedArtifacts,
}

/// Train on the configured device, then export.
pub fn run_training(
    cfg:           &TrainConfig,
    train_dataset: ImageDataset,
    val_dataset:   ImageDataset,
    class_map:     &ClassMap,
    exporter:      &ArtifactExporter,
) -> Result<TrainingSummary> {
    match cfg.device {
        ComputeDevice::Wgpu => {
            let device = WgpuDevice::default();
            tracing::info!("Using WGPU device: {:?}", device);
            train_loop::<Autodiff<Wgpu>>(cfg, train_dataset, val_dataset, class_map, exporter, device)
        }
        ComputeDevice::Cpu => {
            let device = NdArrayDevice::Cpu;
            tracing::info!("Using CPU device: {:?}", device);
            train_loop::<Autodiff<NdArray>>(cfg, train_dataset, val_dataset, class_map, exporter, device)
        }
    }
}

/// Training loader shuffled by `cfg.seed`, validation loader in dataset order.
///
/// Neither gets worker threads: burn's multi-threaded loader hands out
/// batches as workers finish, so the order would no longer be fixed.
fn build_loaders<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    train_dataset: ImageDataset,
    val_dataset:   ImageDataset,
    device:        &B::Device,
) -> (Arc<dyn DataLoader<ImageBatch<B>>>, Arc<dyn DataLoader<ImageBatch<B::InnerBackend>>>) {
    let size = cfg.image_size;
    let train = DataLoaderBuilder::new(ImageBatcher::<B>::new(device.clone(), size, size))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .build(train_dataset);

    // No autodiff overhead
    let val = DataLoaderBuilder::new(ImageBatcher::<B::InnerBackend>::new(device.clone(), size, size))
        .batch_size(cfg.batch_size)
        .build(val_dataset);

    (train, val)
}

fn train_loop<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    train_dataset: ImageDataset,
    val_dataset:   ImageDataset,
    class_map:     &ClassMap,
    exporter:      &ArtifactExporter,
    device:        B::Device,
) -> Result<TrainingSummary> {
    // ── Build model ───────────────────────────────────────────────────────────
    let model_cfg = cfg.model_config(class_map.len());
    let model: TumorClassifier<B> = model_cfg.init(&device)?;
    tracing::info!(
        "Model ready: {} classes, {}x{} input, {} flattened features",
        class_map.len(),
        cfg.image_size,
        cfg.image_size,
        model.num_flatten,
    );

    // ── Adam optimiser ────────────────────────────────────────────────────────
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let optim = AdamConfig::new().with_epsilon(1e-8).init();

    // ── Data loaders ──────────────────────────────────────────────────────────
    let size = cfg.image_size;
    let (train_loader, val_loader) = build_loaders::<B>(cfg, train_dataset, val_dataset, &device);

    let metrics_log = MetricsLogger::new(exporter.dir());

    let outcome = fit(
        FitSettings { epochs: cfg.epochs, lr: cfg.lr },
        model,
        optim,
        train_loader.as_ref(),
        val_loader.as_ref(),
        class_map.names(),
        Some(&metrics_log),
    )?;

    // ── Export (only after the loop has completed) ────────────────────────────
    exporter.save_config(cfg)?;
    exporter.write_class_map(class_map)?;
    let artifacts = exporter
        .export_model(&outcome.model.valid(), [1, CHANNELS, size, size])
        .context("Model export failed")?;
    exporter.write_report(&outcome.final_report)?;

    Ok(TrainingSummary {
        best_f1:      outcome.best_f1,
        restored:     outcome.restored,
        history:      outcome.history,
        final_report: outcome.final_report,
        artifacts,
    })
}
