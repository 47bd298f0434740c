// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs, functions and traits that define the core
// concepts of the classifier pipeline.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, functions and traits
//
// Everything here is unit-testable without a GPU.
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Ordered class names + name → index lookup
pub mod class_map;

// Configuration / data / numerical error taxonomy
pub mod error;

// A labeled image path
pub mod image_record;

// Epoch metrics, precision/recall/F1 report
pub mod metrics;

// Convolution output-shape arithmetic
pub mod shape;

// Core abstractions (traits) that other layers implement
pub mod traits;
