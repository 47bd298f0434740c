// ============================================================
// Layer 4 — Image Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<ImageItem>
// into one image tensor and one label tensor.
//
//   Input:  N ImageItems, each 3 * H * W floats (CHW)
//   Output: images  [N, 3, H, W]   (float)
//           targets [N]            (int, class indices)
//
// N images always come with N labels: both tensors are built
// from the same item list. The last batch of an epoch may be
// smaller than the configured batch size.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::{dataset::ImageItem, preprocessor::CHANNELS};

// ─── ImageBatch ───────────────────────────────────────────────────────────────
/// A batch of images ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// Shape: [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,

    /// Ground-truth class indices, shape: [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> ImageBatch<B> {
    pub fn len(&self) -> usize {
        self.targets.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── ImageBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct ImageBatcher<B: Backend> {
    device: B::Device,
    height: usize,
    width:  usize,
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(device: B::Device, height: usize, width: usize) -> Self {
        Self { device, height, width }
    }
}

impl<B: Backend> Batcher<ImageItem, ImageBatch<B>> for ImageBatcher<B> {
    fn batch(&self, items: Vec<ImageItem>) -> ImageBatch<B> {
        let batch_size = items.len();

        let pixels: Vec<f32> = items
            .iter()
            .flat_map(|item| item.pixels.iter().copied())
            .collect();

        let labels: Vec<i32> = items
            .iter()
            .map(|item| item.label as i32)
            .collect();

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [batch_size, CHANNELS, self.height, self.width]),
            &self.device,
        );

        let targets = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        ImageBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_batch_shapes() {
        let device  = Default::default();
        let batcher = ImageBatcher::<TestBackend>::new(device, 4, 5);
        let items   = (0..3)
            .map(|i| ImageItem { pixels: vec![i as f32; 3 * 4 * 5], label: i % 2 })
            .collect();

        let batch = batcher.batch(items);
        assert_eq!(batch.images.dims(), [3, 3, 4, 5]);
        assert_eq!(batch.len(), 3);

        let labels: Vec<i64> = batch.targets.into_data().iter::<i64>().collect();
        assert_eq!(labels, vec![0, 1, 0]);
    }
}
