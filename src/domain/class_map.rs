// ============================================================
// Layer 3 — ClassMap Domain Type
// ============================================================
// Ordered class names plus the name → index lookup, derived
// once from the dataset's sub-directory names.
//
// Example directory:
//   data/
//     no_tumor/   → index 0
//     tumor/      → index 1
//
// The map is persisted next to the model (class_map.json) so an
// inference consumer can decode a predicted index into a label:
//   { "classes": ["no_tumor", "tumor"],
//     "class_to_idx": { "no_tumor": 0, "tumor": 1 } }
//
// Reference: Rust Book §8 (Collections)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::error::TrainError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMap {
    /// Class names in index order
    classes: Vec<String>,

    /// Reverse lookup, always consistent with `classes`
    class_to_idx: BTreeMap<String, usize>,
}

impl ClassMap {
    /// Build a map from class names in the order they were scanned.
    /// Duplicate or empty names are rejected.
    pub fn new(classes: Vec<String>) -> Result<Self, TrainError> {
        let mut class_to_idx = BTreeMap::new();
        for (idx, name) in classes.iter().enumerate() {
            if name.is_empty() {
                return Err(TrainError::data("class name must not be empty"));
            }
            if class_to_idx.insert(name.clone(), idx).is_some() {
                return Err(TrainError::data(format!("duplicate class name '{name}'")));
            }
        }
        Ok(Self { classes, class_to_idx })
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.classes
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.class_to_idx.get(name).copied()
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    /// Re-check the invariants after deserialising from disk.
    pub fn validate(&self) -> Result<(), TrainError> {
        let rebuilt = Self::new(self.classes.clone())?;
        if rebuilt.class_to_idx != self.class_to_idx {
            return Err(TrainError::data(
                "class_to_idx does not match the ordered class list",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_indices_follow_order() {
        let map = ClassMap::new(names(&["no_tumor", "tumor"])).unwrap();
        assert_eq!(map.index_of("no_tumor"), Some(0));
        assert_eq!(map.index_of("tumor"), Some(1));
        assert_eq!(map.name_of(1), Some("tumor"));
        assert_eq!(map.name_of(2), None);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        assert!(ClassMap::new(names(&["a", "a"])).is_err());
    }

    #[test]
    fn test_json_layout() {
        let map  = ClassMap::new(names(&["no", "yes"])).unwrap();
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["classes"], serde_json::json!(["no", "yes"]));
        assert_eq!(json["class_to_idx"]["yes"], serde_json::json!(1));
    }

    #[test]
    fn test_validate_catches_tampered_lookup() {
        let json = r#"{"classes":["a","b"],"class_to_idx":{"a":1,"b":0}}"#;
        let map: ClassMap = serde_json::from_str(json).unwrap();
        assert!(map.validate().is_err());
    }
}
