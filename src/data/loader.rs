// ============================================================
// Layer 4 — Image Folder Loader
// ============================================================
// Scans a directory laid out as one sub-directory per class:
//
//   data/
//     no/          ← class 0
//       1.jpg
//       2.png
//     yes/         ← class 1
//       Y1.jpg
//
// Class indices follow the sorted sub-directory names, so the
// same directory always produces the same ClassMap. Files inside
// each class are also visited in sorted order, which keeps the
// seeded train/validation split reproducible across machines.
//
// Only the paths are collected here; pixels are decoded later by
// the dataset.
//
// Reference: walkdir crate documentation
//            Rust Book §9 (Error Handling)

use std::{fs, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::domain::{
    class_map::ClassMap,
    error::TrainError,
    image_record::{class_counts, ImageRecord},
    traits::ImageSource,
};

/// File extensions accepted as images (compared lowercase)
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Loads labeled image paths from a folder-per-class directory.
pub struct ImageFolderLoader {
    dir: PathBuf,
}

impl ImageFolderLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Sorted names of the immediate sub-directories
    fn class_dirs(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read directory '{}'", self.dir.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

impl ImageSource for ImageFolderLoader {
    fn scan(&self) -> Result<(ClassMap, Vec<ImageRecord>)> {
        if !self.dir.is_dir() {
            return Err(TrainError::data(format!(
                "data directory '{}' does not exist",
                self.dir.display()
            ))
            .into());
        }

        let class_map = ClassMap::new(self.class_dirs()?)?;
        if class_map.is_empty() {
            return Err(TrainError::data(format!(
                "data directory '{}' has no class sub-directories",
                self.dir.display()
            ))
            .into());
        }

        let mut records = Vec::new();
        for (label, class_name) in class_map.names().iter().enumerate() {
            let class_dir = self.dir.join(class_name);

            for entry in WalkDir::new(&class_dir)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
            {
                let entry = entry
                    .with_context(|| format!("Cannot list '{}'", class_dir.display()))?;
                let path = entry.path();
                if entry.file_type().is_file() && is_image(path) {
                    records.push(ImageRecord::new(path, label));
                }
            }
        }

        let counts = class_counts(&records, class_map.len());
        for (name, count) in class_map.names().iter().zip(&counts) {
            tracing::debug!("Class '{}': {} images", name, count);
        }
        tracing::info!(
            "Scanned '{}': {} classes, {} images",
            self.dir.display(),
            class_map.len(),
            records.len()
        );

        Ok((class_map, records))
    }
}
