// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Classifies single images with a trained model.
//
//   train_config.json → architecture + image size
//   weights           → TumorClassifier (evaluation mode only)
//   class_map.json    → index → label
//
//   image → deterministic preprocessing → logits → softmax
//
// The predicted class is the argmax of the softmax; its
// probability is reported as the confidence.

use std::{collections::BTreeMap, path::Path};

use anyhow::Result;
use burn::{prelude::*, tensor::activation::softmax};
use serde::{Deserialize, Serialize};

use crate::data::preprocessor::{Preprocessor, CHANNELS};
use crate::domain::{class_map::ClassMap, error::TrainError};
use crate::infra::exporter::ArtifactExporter;
use crate::ml::model::{Mode, TumorClassifier};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label:         String,
    pub class_index:   usize,
    pub confidence:    f32,
    pub probabilities: BTreeMap<String, f32>,
}

pub struct Predictor<B: Backend> {
    model:        TumorClassifier<B>,
    preprocessor: Preprocessor,
    class_map:    ClassMap,
    device:       B::Device,
}

impl<B: Backend> Predictor<B> {
    pub fn new(
        model:        TumorClassifier<B>,
        preprocessor: Preprocessor,
        class_map:    ClassMap,
        device:       B::Device,
    ) -> Result<Self> {
        if model.num_classes() != class_map.len() {
            return Err(TrainError::configuration(format!(
                "model predicts {} classes but the class map has {}",
                model.num_classes(),
                class_map.len()
            ))
            .into());
        }
        Ok(Self { model, preprocessor, class_map, device })
    }

    /// Rebuild the trained model from an output directory.
    pub fn from_artifacts(exporter: &ArtifactExporter, device: B::Device) -> Result<Self> {
        let cfg       = exporter.load_config()?;
        let class_map = exporter.load_class_map()?;
        let model     = cfg.model_config(class_map.len()).init::<B>(&device)?;
        let model     = exporter.load_model(model, &device)?;
        tracing::info!("Model loaded from '{}'", exporter.dir().display());

        let preprocessor = Preprocessor::new(cfg.image_size, cfg.image_size)?;
        Self::new(model, preprocessor, class_map, device)
    }

    pub fn class_map(&self) -> &ClassMap {
        &self.class_map
    }

    pub fn predict(&self, path: &Path) -> Result<Prediction> {
        let pixels = self.preprocessor.load_tensor(path)?;
        self.predict_pixels(pixels)
    }

    /// Classify one preprocessed CHW image.
    pub fn predict_pixels(&self, pixels: Vec<f32>) -> Result<Prediction> {
        let (h, w) = (self.preprocessor.height(), self.preprocessor.width());
        if pixels.len() != self.preprocessor.tensor_len() {
            return Err(TrainError::data(format!(
                "expected {} values for a {CHANNELS}x{h}x{w} image, got {}",
                self.preprocessor.tensor_len(),
                pixels.len()
            ))
            .into());
        }

        let input  = Tensor::<B, 4>::from_data(TensorData::new(pixels, [1, CHANNELS, h, w]), &self.device);
        let logits = self.model.forward(input, Mode::Eval);
        let probs: Vec<f32> = softmax(logits, 1).into_data().iter::<f32>().collect();

        // Ties resolve to the lowest index, like argmax
        let (class_index, confidence) = probs
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, p)| if p > best.1 { (i, p) } else { best });

        let probabilities = self
            .class_map
            .names()
            .iter()
            .cloned()
            .zip(probs.iter().copied())
            .collect();

        let label = self
            .class_map
            .name_of(class_index)
            .ok_or_else(|| TrainError::data(format!("no class for index {class_index}")))?
            .to_string();

        tracing::debug!("Predicted '{}' (p={:.4})", label, confidence);
        Ok(Prediction { label, class_index, confidence, probabilities })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use image::{Rgb, RgbImage};

    use crate::application::train_use_case::TrainConfig;
    use crate::ml::model::TumorClassifierConfig;

    type TestBackend = NdArray;

    const SIDE: usize = 48;

    fn class_map() -> ClassMap {
        ClassMap::new(vec!["no_tumor".into(), "tumor".into()]).unwrap()
    }

    fn model(num_classes: usize) -> TumorClassifier<TestBackend> {
        TumorClassifierConfig::new(num_classes)
            .with_height(SIDE)
            .with_width(SIDE)
            .with_initial_filters(2)
            .with_hidden(8)
            .init(&Default::default())
            .unwrap()
    }

    fn write_png(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("scan.png");
        RgbImage::from_pixel(64, 64, Rgb([90, 90, 90])).save(&path).unwrap();
        path
    }

    #[test]
    fn test_probabilities_cover_every_class() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = write_png(tmp.path());

        let predictor = Predictor::new(model(2), Preprocessor::new(SIDE, SIDE).unwrap(), class_map(), Default::default()).unwrap();
        let p = predictor.predict(&path).unwrap();

        assert_eq!(p.probabilities.len(), 2);
        let total: f32 = p.probabilities.values().sum();
        assert!((total - 1.0).abs() < 1e-4);
        assert_eq!(p.probabilities[&p.label], p.confidence);
        assert!(p.probabilities.values().all(|&q| q <= p.confidence));
    }

    #[test]
    fn test_class_count_mismatch_rejected() {
        let result = Predictor::new(model(3), Preprocessor::new(SIDE, SIDE).unwrap(), class_map(), Default::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_pixel_count_rejected() {
        let predictor = Predictor::new(model(2), Preprocessor::new(SIDE, SIDE).unwrap(), class_map(), Default::default()).unwrap();
        assert!(predictor.predict_pixels(vec![0.0; 10]).is_err());
    }

    #[test]
    fn test_from_artifacts_matches_exported_model() {
        let tmp      = tempfile::tempdir().unwrap();
        let exporter = ArtifactExporter::new(tmp.path());

        let cfg = TrainConfig {
            image_size:      SIDE,
            initial_filters: 2,
            hidden:          8,
            ..TrainConfig::default()
        };
        let trained = model(2);
        exporter.save_config(&cfg).unwrap();
        exporter.write_class_map(&class_map()).unwrap();
        exporter.export_model(&trained, [1, 3, SIDE, SIDE]).unwrap();

        let loaded = Predictor::<TestBackend>::from_artifacts(&exporter, Default::default()).unwrap();
        let direct = Predictor::new(trained, Preprocessor::new(SIDE, SIDE).unwrap(), class_map(), Default::default()).unwrap();

        let image = write_png(tmp.path());
        let a = loaded.predict(&image).unwrap();
        let b = direct.predict(&image).unwrap();
        assert_eq!(loaded.class_map().names(), direct.class_map().names());
        // Weights are stored at half precision
        for (name, p) in &a.probabilities {
            assert!((p - b.probabilities[name]).abs() < 1e-2, "{name}: {p} vs {}", b.probabilities[name]);
        }
    }
}
