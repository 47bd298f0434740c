// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Holds out a fixed fraction of the scanned images for
// validation, once, at startup.
//
//   num_val   = floor(total * val_fraction)
//   num_train = total - num_val
//
// The shuffle is seeded (ChaCha8): the same directory and seed
// always give the same split, so a rerun validates on the same
// images. Records are shuffled, then the first num_train go to
// training and the rest to validation.
//
// Reference: rand / rand_chacha crate documentation

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Shuffle `samples` with `seed` and split into (train, validation).
pub fn split_train_val<T>(mut samples: Vec<T>, val_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total   = samples.len();
    let num_val = ((total as f64) * val_fraction).floor() as usize;
    let num_val = num_val.min(total);

    let val = samples.split_off(total - num_val);

    tracing::debug!(
        "Dataset split: {} training, {} validation (seed {})",
        samples.len(),
        val.len(),
        seed,
    );

    (samples, val)
}
