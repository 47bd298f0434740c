// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the output directory:
//
//   exporter.rs     — Model artifacts
//                     Weights through Burn's CompactRecorder,
//                     the portable graph, the class map, the
//                     run config and the final report. Also
//                     reads them back for inference.
//
//   graph_export.rs — Framework-neutral computation graph
//                     Ordered ops plus every parameter tensor,
//                     written as one JSON blob.
//
//   metrics.rs      — Training metrics logging
//                     One CSV row per epoch for plotting
//                     learning curves.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model artifact export and loading
pub mod exporter;

/// Portable computation-graph blob
pub mod graph_export;

/// Training metrics CSV logger
pub mod metrics;
