// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from a directory of labeled images to tensor
// batches:
//
//   class-per-folder directory
//       │
//       ▼
//   ImageFolderLoader  → ClassMap + labeled image paths
//       │
//       ▼
//   split_train_val    → seeded hold-out of the validation set
//       │
//       ▼
//   ImageDataset       → decoded images, Burn Dataset trait
//       │               (augmented for training only)
//       ▼
//   ImageBatcher       → stacks items into [N,3,H,W] + [N]
//       │
//       ▼
//   DataLoader         → shuffled (train) / fixed-order (val)
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Scans class sub-directories for image files
pub mod loader;

/// Decode, resize, augment and normalise images
pub mod preprocessor;

/// Implements Burn's Dataset trait for decoded images
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded train/validation split
pub mod splitter;
