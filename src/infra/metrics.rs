// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records one CSV row per training epoch so learning curves can
// be plotted after the run.
//
// Columns:
//   epoch         1-based epoch number
//   train_loss    sample-weighted cross-entropy on the training set
//   train_acc     training accuracy (dropout on, augmented images)
//   val_loss      sample-weighted cross-entropy on the validation set
//   val_acc       validation accuracy
//   val_macro_f1  macro-F1 of this epoch's validation pass
//   best_f1       best macro-F1 so far (never decreases)
//
// Output file: <output_dir>/metrics.csv. Nothing touches the disk
// until the first epoch is logged; that write replaces any file
// left by an earlier run so rows from different runs never mix.
//
// Example:
//   epoch,train_loss,val_loss,...
//   1,0.693100,0.681200,...
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    cell::Cell,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

use crate::domain::metrics::EpochMetrics;

pub const METRICS_FILE: &str = "metrics.csv";

const HEADER: &str = "epoch,train_loss,train_acc,val_loss,val_acc,val_macro_f1,best_f1";

/// Everything recorded about one completed epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    /// The epoch number (starts at 1)
    pub epoch:        usize,
    pub train:        EpochMetrics,
    pub validation:   EpochMetrics,
    pub val_macro_f1: f64,
    /// Best validation macro-F1 up to and including this epoch
    pub best_f1:      f64,
    /// Whether this epoch replaced the best checkpoint
    pub improved:     bool,
}

/// Appends epoch summaries to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
    started:  Cell<bool>,
}

impl MetricsLogger {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            csv_path: dir.as_ref().join(METRICS_FILE),
            started:  Cell::new(false),
        }
    }

    /// Create the directory and a fresh CSV holding just the header.
    fn start(&self) -> Result<()> {
        if let Some(dir) = self.csv_path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;
        }
        let mut f = fs::File::create(&self.csv_path)
            .with_context(|| format!("Cannot create '{}'", self.csv_path.display()))?;
        writeln!(f, "{HEADER}")?;

        tracing::debug!("Created metrics CSV: '{}'", self.csv_path.display());
        self.started.set(true);
        Ok(())
    }

    /// Append one epoch as a new row, starting the file on the first call.
    pub fn log(&self, s: &EpochSummary) -> Result<()> {
        if !self.started.get() {
            self.start()?;
        }
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            s.epoch,
            s.train.average_loss,
            s.train.accuracy,
            s.validation.average_loss,
            s.validation.accuracy,
            s.val_macro_f1,
            s.best_f1,
        )?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn summary(epoch: usize, f1: f64, best: f64) -> EpochSummary {
        let m = EpochMetrics { average_loss: 0.5, accuracy: 0.75, samples: 4 };
        EpochSummary {
            epoch,
            train:        m,
            validation:   m,
            val_macro_f1: f1,
            best_f1:      best,
            improved:     f1 >= best,
        }
    }

    #[test]
    fn test_header_then_one_row_per_epoch() {
        let tmp    = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(tmp.path());
        logger.log(&summary(1, 0.4, 0.4)).unwrap();
        logger.log(&summary(2, 0.3, 0.4)).unwrap();

        let text  = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert!(lines[2].starts_with("2,0.500000,0.750000"));
        assert!(lines[2].ends_with("0.300000,0.400000"));
    }

    #[test]
    fn test_nothing_written_before_first_epoch() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("out");
        let logger = MetricsLogger::new(&dir);
        assert!(!dir.exists());

        logger.log(&summary(1, 0.2, 0.2)).unwrap();
        assert!(logger.csv_path().exists());
    }

    #[test]
    fn test_new_run_replaces_previous_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let old = MetricsLogger::new(tmp.path());
        old.log(&summary(1, 0.1, 0.1)).unwrap();
        old.log(&summary(2, 0.2, 0.2)).unwrap();

        let logger = MetricsLogger::new(tmp.path());
        logger.log(&summary(1, 0.3, 0.3)).unwrap();
        let text = fs::read_to_string(logger.csv_path()).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
