// ============================================================
// Layer 3 — Convolution Shape Calculator
// ============================================================
// Computes the spatial size of a feature map after a 2D
// convolution, optionally followed by a fixed-factor pooling.
//
//   out = floor((in + 2*padding - dilation*(kernel-1) - 1) / stride + 1)
//   out = out / pool            (integer division, if pooling)
//
// The classifier uses this to derive the width of its first
// fully-connected layer without running a probe tensor through
// the network: the output of stage k is the input of stage k+1.
//
// Example (256x256 input, 3x3 conv, pool 2):
//   256 → 254 → 127
//   127 → 125 →  62
//    62 →  60 →  30
//    30 →  28 →  14      → flatten = 14 * 14 * 8f
//
// Reference: PyTorch Conv2d documentation (shape section)

use serde::{Deserialize, Serialize};

use crate::domain::error::TrainError;

/// Number of conv + pool stages in the classifier
pub const CONV_STAGES: usize = 4;

/// Pooling factor applied after every convolution
pub const POOL_FACTOR: usize = 2;

/// Height and width of a feature map. Both are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerShape {
    pub height: usize,
    pub width:  usize,
}

impl LayerShape {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    /// Number of spatial positions (height * width)
    pub fn area(&self) -> usize {
        self.height * self.width
    }
}

/// Parameters of a single 2D convolution (square kernel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvParams {
    pub kernel_size: usize,
    pub stride:      usize,
    pub padding:     usize,
    pub dilation:    usize,
}

impl ConvParams {
    /// The classifier's block convolution: 3x3, stride 1, no padding
    pub const fn block() -> Self {
        Self { kernel_size: 3, stride: 1, padding: 0, dilation: 1 }
    }
}

impl Default for ConvParams {
    fn default() -> Self {
        Self::block()
    }
}

/// Apply the convolution output-size formula to one dimension.
fn conv_dim(input: i64, conv: &ConvParams) -> i64 {
    let k = conv.kernel_size as i64;
    let s = conv.stride as i64;
    let p = conv.padding as i64;
    let d = conv.dilation as i64;
    // div_euclid floors for a negative numerator as well
    (input + 2 * p - d * (k - 1) - 1).div_euclid(s) + 1
}

/// Output (height, width) after a convolution and optional pooling.
///
/// Degenerate inputs produce values <= 0; it is up to the caller to
/// reject them (see `feature_map_shape`). A zero stride has no output
/// size and is a configuration error.
pub fn conv2d_output_dims(
    height: i64,
    width:  i64,
    conv:   &ConvParams,
    pool:   Option<usize>,
) -> Result<(i64, i64), TrainError> {
    if conv.stride == 0 {
        return Err(TrainError::configuration("convolution stride must be at least 1"));
    }
    let mut h = conv_dim(height, conv);
    let mut w = conv_dim(width, conv);

    if let Some(p) = pool.filter(|&p| p > 0) {
        h /= p as i64;
        w /= p as i64;
    }
    Ok((h, w))
}

/// Thread `input` through `stages` conv + pool blocks and return the
/// final feature-map shape.
///
/// Returns a configuration error naming the first stage whose output
/// collapses to zero or below.
pub fn feature_map_shape(input: LayerShape, stages: usize) -> Result<LayerShape, TrainError> {
    let conv = ConvParams::block();
    let (mut h, mut w) = (input.height as i64, input.width as i64);

    for stage in 1..=stages {
        let (next_h, next_w) = conv2d_output_dims(h, w, &conv, Some(POOL_FACTOR))?;
        if next_h < 1 || next_w < 1 {
            return Err(TrainError::configuration(format!(
                "input {}x{} is too small for {} conv+pool stages: \
                 stage {} maps {}x{} to {}x{}",
                input.height, input.width, stages, stage, h, w, next_h, next_w
            )));
        }
        h = next_h;
        w = next_w;
    }

    Ok(LayerShape::new(h as usize, w as usize))
}
