// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training pipeline only needs "something that can list
// labeled images". The folder-per-class loader implements it
// today; a CSV manifest or a remote bucket could implement it
// later without touching the application layer.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::{class_map::ClassMap, image_record::ImageRecord};

// ─── ImageSource ──────────────────────────────────────────────────────────────
/// Any component that can enumerate a labeled image collection.
///
/// Implementations:
///   - ImageFolderLoader → one sub-directory per class
pub trait ImageSource {
    /// Discover the classes and every labeled image.
    /// Labels in the returned records index into the returned ClassMap.
    fn scan(&self) -> Result<(ClassMap, Vec<ImageRecord>)>;
}
