// ============================================================
// Layer 4 — Image Preprocessor
// ============================================================
// Turns an image file into the float tensor layout the model
// expects, with optional random augmentation for training.
//
// Deterministic path (validation and inference):
//   1. Decode (jpg / png / bmp)
//   2. Resize to (height, width) with a triangle filter
//   3. Convert to RGB
//   4. CHW float layout, scaled to [0, 1]
//   5. Normalise each channel with ImageNet mean / std
//
// Training path adds, between 3 and 4:
//   - horizontal flip with p = 0.5
//   - vertical flip   with p = 0.5
//   - rotation by a uniform angle in [-30°, 30°]
//     (nearest neighbour, corners filled with black)
//
// Reference: image crate documentation
//            torchvision transforms (Resize, RandomRotation)

use std::path::Path;

use anyhow::{Context, Result};
use image::{imageops, imageops::FilterType, ImageReader, Rgb, RgbImage};
use rand::Rng;

use crate::domain::error::TrainError;

/// Per-channel mean used for normalisation (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel standard deviation used for normalisation (RGB)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Maximum absolute rotation applied during augmentation
pub const MAX_ROTATION_DEGREES: f32 = 30.0;

/// Number of colour channels produced
pub const CHANNELS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preprocessor {
    height: u32,
    width:  u32,
}

impl Preprocessor {
    /// Fails when a side does not fit the image crate's `u32` dimensions.
    pub fn new(height: usize, width: usize) -> Result<Self, TrainError> {
        let side = |v: usize| {
            u32::try_from(v)
                .map_err(|_| TrainError::configuration(format!("image side {v} exceeds {}", u32::MAX)))
        };
        Ok(Self { height: side(height)?, width: side(width)? })
    }

    pub fn height(&self) -> usize {
        self.height as usize
    }

    pub fn width(&self) -> usize {
        self.width as usize
    }

    /// Number of floats in one preprocessed image (C * H * W)
    pub fn tensor_len(&self) -> usize {
        CHANNELS * self.height() * self.width()
    }

    /// Decode and resize an image file to the configured resolution.
    pub fn load(&self, path: &Path) -> Result<RgbImage> {
        let img = ImageReader::open(path)
            .with_context(|| format!("Failed to open image '{}'", path.display()))?
            .with_guessed_format()
            .with_context(|| format!("Failed to read image '{}'", path.display()))?
            .decode()
            .with_context(|| format!("Failed to decode image '{}'", path.display()))?;

        Ok(self.resize(&img.to_rgb8()))
    }

    /// Resize an in-memory image to the configured resolution.
    pub fn resize(&self, img: &RgbImage) -> RgbImage {
        if img.dimensions() == (self.width, self.height) {
            return img.clone();
        }
        imageops::resize(img, self.width, self.height, FilterType::Triangle)
    }

    /// Random flips and rotation for training batches.
    pub fn augment<R: Rng + ?Sized>(&self, img: &RgbImage, rng: &mut R) -> RgbImage {
        let mut out = img.clone();
        if rng.gen_bool(0.5) {
            imageops::flip_horizontal_in_place(&mut out);
        }
        if rng.gen_bool(0.5) {
            imageops::flip_vertical_in_place(&mut out);
        }
        let angle = rng.gen_range(-MAX_ROTATION_DEGREES..=MAX_ROTATION_DEGREES);
        rotate(&out, angle)
    }

    /// CHW float layout normalised with ImageNet statistics.
    pub fn to_chw(&self, img: &RgbImage) -> Vec<f32> {
        let (width, height) = (img.width() as usize, img.height() as usize);
        let plane = height * width;
        let mut out = vec![0.0f32; CHANNELS * plane];

        for (x, y, pixel) in img.enumerate_pixels() {
            let idx = y as usize * width + x as usize;
            for c in 0..CHANNELS {
                let v = pixel[c] as f32 / 255.0;
                out[c * plane + idx] = (v - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            }
        }
        out
    }

    /// Deterministic path from file to tensor data.
    pub fn load_tensor(&self, path: &Path) -> Result<Vec<f32>> {
        Ok(self.to_chw(&self.load(path)?))
    }
}

/// Rotate around the image centre by `degrees` (counter-clockwise),
/// keeping the original size.
pub fn rotate(img: &RgbImage, degrees: f32) -> RgbImage {
    let (w, h) = img.dimensions();
    let (sin, cos) = degrees.to_radians().sin_cos();
    let cx = (w as f32 - 1.0) / 2.0;
    let cy = (h as f32 - 1.0) / 2.0;

    RgbImage::from_fn(w, h, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        // inverse mapping: where does this output pixel come from?
        let sx = (cos * dx - sin * dy + cx).round();
        let sy = (sin * dx + cos * dy + cy).round();

        if sx >= 0.0 && sy >= 0.0 && (sx as u32) < w && (sy as u32) < h {
            *img.get_pixel(sx as u32, sy as u32)
        } else {
            Rgb([0, 0, 0])
        }
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x * 10) as u8, (y * 10) as u8, 128]))
    }

    #[test]
    fn test_chw_layout_and_normalisation() {
        let img = RgbImage::from_pixel(2, 2, Rgb([255, 0, 0]));
        let p   = Preprocessor::new(2, 2).unwrap();
        let t   = p.to_chw(&img);

        assert_eq!(t.len(), p.tensor_len());
        let red  = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let blue = (0.0 - IMAGENET_MEAN[2]) / IMAGENET_STD[2];
        assert!((t[0] - red).abs() < 1e-6);
        assert!((t[8] - blue).abs() < 1e-6);
    }

    #[test]
    fn test_resize_to_target() {
        let p = Preprocessor::new(16, 24).unwrap();
        let r = p.resize(&gradient(10, 10));
        assert_eq!(r.dimensions(), (24, 16));
    }

    #[test]
    fn test_zero_rotation_is_identity() {
        let img = gradient(9, 7);
        assert_eq!(rotate(&img, 0.0), img);
    }

    #[test]
    fn test_half_turn_rotation() {
        let img = gradient(5, 5);
        let r   = rotate(&img, 180.0);
        assert_eq!(r.get_pixel(0, 0), img.get_pixel(4, 4));
        assert_eq!(r.get_pixel(2, 2), img.get_pixel(2, 2));
    }

    #[test]
    fn test_augment_keeps_size() {
        let p   = Preprocessor::new(12, 12).unwrap();
        let img = gradient(12, 12);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..10 {
            assert_eq!(p.augment(&img, &mut rng).dimensions(), (12, 12));
        }
    }

    #[test]
    fn test_load_from_disk() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("img.png");
        gradient(20, 30).save(&path).unwrap();

        let p = Preprocessor::new(8, 8).unwrap();
        let t = p.load_tensor(&path).unwrap();
        assert_eq!(t.len(), 3 * 8 * 8);
    }

    #[test]
    fn test_unreadable_file_errors() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        assert!(Preprocessor::new(8, 8).unwrap().load(&path).is_err());
    }

    #[test]
    fn test_side_beyond_u32_is_rejected() {
        let err = Preprocessor::new(usize::MAX, 8).unwrap_err();
        assert!(matches!(err, TrainError::Configuration(_)));
        assert!(Preprocessor::new(8, u32::MAX as usize).is_ok());
    }
}
