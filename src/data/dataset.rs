use anyhow::Result;
use burn::data::dataset::Dataset;
use image::RgbImage;

use crate::data::preprocessor::Preprocessor;
use crate::domain::image_record::ImageRecord;

/// One preprocessed image ready for batching.
/// `pixels` is CHW, normalised, of length 3 * H * W.
#[derive(Debug, Clone)]
pub struct ImageItem {
    pub pixels: Vec<f32>,
    pub label:  usize,
}

/// Decoded images plus the preprocessing applied on every `get`.
///
/// Images are decoded and resized once, up front, so an unreadable
/// file fails the run at startup instead of vanishing from an epoch.
/// With `augment` set, every `get` draws fresh random flips and
/// rotation; otherwise the output is deterministic.
pub struct ImageDataset {
    images:       Vec<(RgbImage, usize)>,
    preprocessor: Preprocessor,
    augment:      bool,
}

impl ImageDataset {
    pub fn load(records: &[ImageRecord], preprocessor: Preprocessor, augment: bool) -> Result<Self> {
        let images = records
            .iter()
            .map(|r| Ok((preprocessor.load(&r.path)?, r.label)))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!("Decoded {} images (augment={})", images.len(), augment);
        Ok(Self { images, preprocessor, augment })
    }

    /// Build from images already in memory; they are resized if needed.
    pub fn from_images(images: Vec<(RgbImage, usize)>, preprocessor: Preprocessor, augment: bool) -> Self {
        let images = images
            .into_iter()
            .map(|(img, label)| (preprocessor.resize(&img), label))
            .collect();
        Self { images, preprocessor, augment }
    }
}

impl Dataset<ImageItem> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageItem> {
        let (img, label) = self.images.get(index)?;
        let pixels = if self.augment {
            let augmented = self.preprocessor.augment(img, &mut rand::thread_rng());
            self.preprocessor.to_chw(&augmented)
        } else {
            self.preprocessor.to_chw(img)
        };
        Some(ImageItem { pixels, label: *label })
    }

    fn len(&self) -> usize {
        self.images.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn dataset(augment: bool) -> ImageDataset {
        let images = (0..3u8)
            .map(|i| (RgbImage::from_fn(10, 10, |x, y| Rgb([x as u8 * 20, y as u8 * 20, i * 50])), i as usize % 2))
            .collect();
        ImageDataset::from_images(images, Preprocessor::new(8, 8).unwrap(), augment)
    }

    #[test]
    fn test_len_and_bounds() {
        let ds = dataset(false);
        assert_eq!(ds.len(), 3);
        assert!(ds.get(3).is_none());
        assert_eq!(ds.get(1).unwrap().label, 1);
        assert_eq!(ds.get(0).unwrap().pixels.len(), 3 * 8 * 8);
    }

    #[test]
    fn test_deterministic_without_augmentation() {
        let ds = dataset(false);
        assert_eq!(ds.get(2).unwrap().pixels, ds.get(2).unwrap().pixels);
    }

    #[test]
    fn test_load_reports_unreadable_files() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.jpg");
        std::fs::write(&path, b"garbage").unwrap();
        let records = vec![ImageRecord::new(path, 0)];
        assert!(ImageDataset::load(&records, Preprocessor::new(8, 8).unwrap(), false).is_err());
    }
}
