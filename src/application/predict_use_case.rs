// ============================================================
// Layer 2 — Predict Use Case
// ============================================================
// Loads the artifacts of a finished training run and classifies
// a single image:
//
//   train_config.json  → rebuild the architecture
//   *.mpk              → load the weights
//   class_map.json     → index → label
//
// The same compute-device choice as training applies.

use std::path::{Path, PathBuf};

use anyhow::Result;
use burn::backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu};

use crate::application::train_use_case::ComputeDevice;
use crate::infra::exporter::ArtifactExporter;
use crate::ml::inferencer::{Prediction, Predictor};

pub struct PredictUseCase {
    exporter: ArtifactExporter,
    device:   ComputeDevice,
}

impl PredictUseCase {
    pub fn new(model_dir: impl Into<PathBuf>, device: ComputeDevice) -> Self {
        Self { exporter: ArtifactExporter::new(model_dir), device }
    }

    pub fn predict(&self, image: &Path) -> Result<Prediction> {
        tracing::info!("Classifying '{}'", image.display());
        match self.device {
            ComputeDevice::Wgpu => {
                Predictor::<Wgpu>::from_artifacts(&self.exporter, WgpuDevice::default())?.predict(image)
            }
            ComputeDevice::Cpu => {
                Predictor::<NdArray>::from_artifacts(&self.exporter, NdArrayDevice::Cpu)?.predict(image)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untrained_model_dir_fails() {
        let tmp   = tempfile::tempdir().unwrap();
        let image = tmp.path().join("scan.png");
        let err   = PredictUseCase::new(tmp.path(), ComputeDevice::Cpu).predict(&image).unwrap_err();
        assert!(format!("{err:#}").contains("train_config.json"));
    }
}
