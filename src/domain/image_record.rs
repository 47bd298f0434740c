// ============================================================
// Layer 3 — ImageRecord Domain Type
// ============================================================
// One labeled image on disk: where it lives and which class
// index it belongs to. No pixels are held here; decoding is
// the data layer's job.
//
// Reference: Rust Book §5 (Structs)

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Path to the image file
    pub path: PathBuf,

    /// Class index into the ClassMap
    pub label: usize,
}

impl ImageRecord {
    pub fn new(path: impl Into<PathBuf>, label: usize) -> Self {
        Self { path: path.into(), label }
    }
}

/// Count how many records fall into each of `num_classes` classes.
/// Labels outside the range are ignored.
pub fn class_counts(records: &[ImageRecord], num_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; num_classes];
    for r in records {
        if let Some(c) = counts.get_mut(r.label) {
            *c += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_counts() {
        let records = vec![
            ImageRecord::new("a.png", 0),
            ImageRecord::new("b.png", 1),
            ImageRecord::new("c.png", 1),
        ];
        assert_eq!(class_counts(&records, 2), vec![1, 2]);
    }
}
