use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
    tensor::{backend::AutodiffBackend, Distribution},
};

use crate::domain::{
    error::TrainError,
    shape::{feature_map_shape, ConvParams, LayerShape, CONV_STAGES, POOL_FACTOR},
};

/// Whether a forward pass is part of training or evaluation.
/// Only dropout looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

#[derive(Config, Debug)]
pub struct TumorClassifierConfig {
    pub num_classes: usize,
    #[config(default = 3)]
    pub in_channels: usize,
    #[config(default = 256)]
    pub height: usize,
    #[config(default = 256)]
    pub width: usize,
    /// Filters of the first conv block; doubled by each following block
    #[config(default = 8)]
    pub initial_filters: usize,
    /// Width of the hidden fully-connected layer
    #[config(default = 100)]
    pub hidden: usize,
    #[config(default = 0.25)]
    pub dropout: f64,
}

impl TumorClassifierConfig {
    /// Spatial shape after the last conv + pool block.
    pub fn feature_shape(&self) -> Result<LayerShape, TrainError> {
        feature_map_shape(LayerShape::new(self.height, self.width), CONV_STAGES)
    }

    /// Channels produced by block `i` (0-based)
    fn block_channels(&self, i: usize) -> usize {
        self.initial_filters << i
    }

    /// Width of the flattened feature vector entering the first linear layer.
    pub fn flattened_width(&self) -> Result<usize, TrainError> {
        Ok(self.feature_shape()?.area() * self.block_channels(CONV_STAGES - 1))
    }

    pub fn validate(&self) -> Result<(), TrainError> {
        if self.num_classes < 2 {
            return Err(TrainError::configuration(format!(
                "need at least 2 classes, got {}",
                self.num_classes
            )));
        }
        if self.in_channels == 0 || self.initial_filters == 0 || self.hidden == 0 {
            return Err(TrainError::configuration(
                "channel, filter and hidden sizes must be positive",
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(TrainError::configuration(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        self.feature_shape().map(|_| ())
    }

    /// Build the network. Fails before allocating anything if the input
    /// resolution cannot survive the four conv + pool blocks.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<TumorClassifier<B>, TrainError> {
        self.validate()?;
        let num_flatten = self.flattened_width()?;
        let k = ConvParams::block().kernel_size;

        let conv = |c_in: usize, c_out: usize| -> Conv2d<B> {
            Conv2dConfig::new([c_in, c_out], [k, k])
                .with_stride([1, 1])
                .with_padding(PaddingConfig2d::Valid)
                .init(device)
        };

        Ok(TumorClassifier {
            conv1:   conv(self.in_channels,     self.block_channels(0)),
            conv2:   conv(self.block_channels(0), self.block_channels(1)),
            conv3:   conv(self.block_channels(1), self.block_channels(2)),
            conv4:   conv(self.block_channels(2), self.block_channels(3)),
            pool:    MaxPool2dConfig::new([POOL_FACTOR, POOL_FACTOR])
                .with_strides([POOL_FACTOR, POOL_FACTOR])
                .init(),
            relu:    Relu::new(),
            fc1:     LinearConfig::new(num_flatten, self.hidden).init(device),
            fc2:     LinearConfig::new(self.hidden, self.num_classes).init(device),
            dropout: self.dropout,
            num_flatten,
            num_classes: self.num_classes,
        })
    }
}

/// Four conv → ReLU → 2x2 max-pool blocks, then
/// linear → ReLU → dropout → linear producing raw logits.
#[derive(Module, Debug)]
pub struct TumorClassifier<B: Backend> {
    pub conv1:   Conv2d<B>,
    pub conv2:   Conv2d<B>,
    pub conv3:   Conv2d<B>,
    pub conv4:   Conv2d<B>,
    pub pool:    MaxPool2d,
    pub relu:    Relu,
    pub fc1:     Linear<B>,
    pub fc2:     Linear<B>,
    pub dropout: f64,
    pub num_flatten: usize,
    pub num_classes: usize,
}

impl<B: Backend> TumorClassifier<B> {
    fn block(&self, conv: &Conv2d<B>, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.pool.forward(self.relu.forward(conv.forward(x)))
    }

    /// Inverted dropout: keep each unit with probability 1 - p and scale
    /// the survivors by 1 / (1 - p). Identity outside training.
    fn apply_dropout(&self, x: Tensor<B, 2>, mode: Mode) -> Tensor<B, 2> {
        if mode == Mode::Eval || self.dropout == 0.0 {
            return x;
        }
        let keep = 1.0 - self.dropout;
        let mask = x.random_like(Distribution::Bernoulli(keep));
        x * mask / keep
    }

    /// images: [batch, channels, height, width] → logits: [batch, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>, mode: Mode) -> Tensor<B, 2> {
        let [batch_size, _, _, _] = images.dims();

        let x = self.block(&self.conv1, images);
        let x = self.block(&self.conv2, x);
        let x = self.block(&self.conv3, x);
        let x = self.block(&self.conv4, x);

        // Width computed analytically at construction time
        let x = x.reshape([batch_size, self.num_flatten]);

        let x = self.relu.forward(self.fc1.forward(x));
        let x = self.apply_dropout(x, mode);
        self.fc2.forward(x)
    }

    /// Index of the highest logit per sample: [batch]
    pub fn predict(&self, images: Tensor<B, 4>) -> Tensor<B, 1, Int> {
        self.forward(images, Mode::Eval).argmax(1).flatten::<1>(0, 1)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

impl<B: AutodiffBackend> TumorClassifier<B> {
    /// Cross-entropy loss on raw logits, plus the logits for bookkeeping.
    pub fn forward_loss(
        &self,
        images:  Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let logits = self.forward(images, Mode::Train);
        let ce = burn::nn::loss::CrossEntropyLossConfig::new().init(&logits.device());
        (ce.forward(logits.clone(), targets), logits)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray;

    fn small_config() -> TumorClassifierConfig {
        TumorClassifierConfig::new(2)
            .with_height(48)
            .with_width(48)
            .with_initial_filters(2)
            .with_hidden(16)
            .with_dropout(0.5)
    }

    fn random_images(batch: usize, device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 4> {
        Tensor::random([batch, 3, 48, 48], Distribution::Normal(0.0, 1.0), device)
    }

    #[test]
    fn test_default_flattened_width() {
        let cfg = TumorClassifierConfig::new(2);
        // 14 * 14 spatial positions * 64 channels
        assert_eq!(cfg.flattened_width().unwrap(), 12544);
    }

    #[test]
    fn test_flattened_width_scales_with_filters() {
        let cfg = TumorClassifierConfig::new(2).with_initial_filters(4);
        assert_eq!(cfg.flattened_width().unwrap(), 14 * 14 * 32);
    }

    #[test]
    fn test_too_small_input_fails_at_init() {
        let device = Default::default();
        let cfg    = TumorClassifierConfig::new(2).with_height(8).with_width(8);
        let result = cfg.init::<TestBackend>(&device);
        assert!(matches!(result, Err(TrainError::Configuration(_))));
    }

    #[test]
    fn test_invalid_dropout_rejected() {
        assert!(small_config().with_dropout(1.0).validate().is_err());
    }

    #[test]
    fn test_logits_shape_for_any_batch_size() {
        let device = Default::default();
        let model  = small_config().init::<TestBackend>(&device).unwrap();
        for batch in [1, 2, 5] {
            let logits = model.forward(random_images(batch, &device), Mode::Eval);
            assert_eq!(logits.dims(), [batch, 2]);
        }
    }

    #[test]
    fn test_eval_mode_is_deterministic() {
        let device = Default::default();
        let model  = small_config().init::<TestBackend>(&device).unwrap();
        let images = random_images(3, &device);

        let a = model.forward(images.clone(), Mode::Eval);
        let b = model.forward(images.clone(), Mode::Eval);
        let c = model.forward(images, Mode::Eval);
        a.into_data().assert_eq(&b.clone().into_data(), true);
        b.into_data().assert_eq(&c.into_data(), true);
    }

    #[test]
    fn test_train_mode_applies_dropout() {
        let device = Default::default();
        let model  = small_config().init::<TestBackend>(&device).unwrap();
        let images = random_images(4, &device);

        // With p = 0.5 over 4 x 16 hidden units, ten identical draws in a
        // row would be astronomically unlikely
        let reference: Vec<f32> = model.forward(images.clone(), Mode::Train).into_data().iter::<f32>().collect();
        let differs = (0..10).any(|_| {
            let next: Vec<f32> = model.forward(images.clone(), Mode::Train).into_data().iter::<f32>().collect();
            next != reference
        });
        assert!(differs, "dropout had no effect in training mode");
    }

    #[test]
    fn test_zero_dropout_train_equals_eval() {
        let device = Default::default();
        let model  = small_config().with_dropout(0.0).init::<TestBackend>(&device).unwrap();
        let images = random_images(2, &device);

        let train = model.forward(images.clone(), Mode::Train);
        let eval  = model.forward(images, Mode::Eval);
        train.into_data().assert_eq(&eval.into_data(), true);
    }

    #[test]
    fn test_forward_loss_is_finite() {
        let device  = Default::default();
        let model   = small_config().init::<Autodiff<TestBackend>>(&device).unwrap();
        let images  = Tensor::random([2, 3, 48, 48], Distribution::Normal(0.0, 1.0), &device);
        let targets = Tensor::<Autodiff<TestBackend>, 1, Int>::from_ints([0, 1], &device);

        let (loss, logits) = model.forward_loss(images, targets);
        let value: f64 = loss.into_scalar().elem::<f64>();
        assert!(value.is_finite());
        assert_eq!(logits.dims(), [2, 2]);
    }

    #[test]
    fn test_predict_returns_one_index_per_sample() {
        let device = Default::default();
        let model  = small_config().init::<TestBackend>(&device).unwrap();
        let preds  = model.predict(random_images(3, &device));
        assert_eq!(preds.dims(), [3]);
    }
}
