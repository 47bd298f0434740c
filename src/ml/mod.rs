// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All network, optimisation and backend code lives here.
//
//   model.rs      — the CNN classifier
//                   • four 3x3 conv → ReLU → 2x2 max-pool blocks
//                   • flattened width computed analytically
//                   • linear → ReLU → dropout → linear head
//                   • explicit Mode::{Train, Eval}
//
//   epoch.rs      — one training pass / one evaluation pass
//
//   trainer.rs    — the epoch loop, best-checkpoint selection by
//                   validation macro-F1, backend dispatch, export
//
//   inferencer.rs — rebuilds the exported model and classifies
//                   single images
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// CNN tumor classifier architecture
pub mod model;

/// Single training and evaluation passes
pub mod epoch;

/// Epoch loop with best-checkpoint selection
pub mod trainer;

/// Loads exported artifacts and predicts single images
pub mod inferencer;
