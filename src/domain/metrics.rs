// ============================================================
// Layer 3 — Classification Metrics
// ============================================================
// Turns the (label, prediction) pairs of one complete validation
// pass into per-class precision / recall / F1 and their averages.
//
// One-vs-rest, per class c:
//   precision = TP / (TP + FP)
//   recall    = TP / (TP + FN)
//   f1        = 2 * precision * recall / (precision + recall)
// A zero denominator yields 0 instead of dividing by zero.
//
// Macro-F1 is the unweighted mean of per-class F1 over the
// classes that occur in the labels or the predictions. A class
// that never occurs still gets a row (all zeros, support 0) but
// does not drag the macro average down.
//
// The report is always computed from the full sequences, never
// averaged batch by batch.
//
// Reference: scikit-learn classification_report / f1_score

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::error::TrainError;

// ─── EpochMetrics ─────────────────────────────────────────────────────────────
/// Loss and accuracy over one full pass of a batch source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Sample-weighted mean of the per-batch loss
    pub average_loss: f64,
    /// correct predictions / samples
    pub accuracy: f64,
    /// Number of samples seen
    pub samples: usize,
}

/// Running sums for an `EpochMetrics`.
#[derive(Debug, Default, Clone)]
pub struct MetricsAccumulator {
    loss_sum: f64,
    correct:  usize,
    samples:  usize,
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one batch: its mean loss, size and number of correct argmax predictions
    pub fn record(&mut self, batch_loss: f64, batch_size: usize, correct: usize) {
        self.loss_sum += batch_loss * batch_size as f64;
        self.samples  += batch_size;
        self.correct  += correct;
    }

    /// Finish the pass. Fails on an empty pass, where both averages are undefined.
    pub fn finish(&self) -> Result<EpochMetrics, TrainError> {
        if self.samples == 0 {
            return Err(TrainError::data("batch source yielded zero samples"));
        }
        Ok(EpochMetrics {
            average_loss: self.loss_sum / self.samples as f64,
            accuracy:     self.correct as f64 / self.samples as f64,
            samples:      self.samples,
        })
    }
}

// ─── Per-class report ─────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub name:      String,
    pub precision: f64,
    pub recall:    f64,
    pub f1:        f64,
    /// Number of true instances of this class
    pub support:   usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub per_class:       Vec<ClassReport>,
    pub accuracy:        f64,
    pub macro_precision: f64,
    pub macro_recall:    f64,
    pub macro_f1:        f64,
    pub weighted_f1:     f64,
    pub total:           usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn f1_score(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Compute the classification report for one validation pass.
///
/// `labels` and `predictions` must be the same non-zero length and every
/// index must be below `class_names.len()`.
pub fn evaluate(
    labels:      &[usize],
    predictions: &[usize],
    class_names: &[String],
) -> Result<ClassificationReport, TrainError> {
    if labels.len() != predictions.len() {
        return Err(TrainError::data(format!(
            "{} labels but {} predictions",
            labels.len(),
            predictions.len()
        )));
    }
    if labels.is_empty() {
        return Err(TrainError::data("cannot compute metrics over zero samples"));
    }

    let num_classes = class_names.len();
    if let Some(&bad) = labels.iter().chain(predictions).find(|&&c| c >= num_classes) {
        return Err(TrainError::data(format!(
            "class index {bad} out of range for {num_classes} classes"
        )));
    }

    // ── Confusion counts ──────────────────────────────────────────────────────
    let mut tp        = vec![0usize; num_classes];
    let mut predicted = vec![0usize; num_classes];
    let mut support   = vec![0usize; num_classes];

    for (&truth, &pred) in labels.iter().zip(predictions) {
        support[truth]  += 1;
        predicted[pred] += 1;
        if truth == pred {
            tp[truth] += 1;
        }
    }

    let per_class: Vec<ClassReport> = (0..num_classes)
        .map(|c| {
            let precision = ratio(tp[c], predicted[c]);
            let recall    = ratio(tp[c], support[c]);
            ClassReport {
                name: class_names[c].clone(),
                precision,
                recall,
                f1: f1_score(precision, recall),
                support: support[c],
            }
        })
        .collect();

    // ── Averages ──────────────────────────────────────────────────────────────
    let observed: Vec<&ClassReport> = per_class
        .iter()
        .enumerate()
        .filter(|(c, _)| support[*c] > 0 || predicted[*c] > 0)
        .map(|(_, r)| r)
        .collect();
    let n_observed = observed.len() as f64;

    let macro_of = |f: fn(&ClassReport) -> f64| -> f64 {
        observed.iter().map(|r| f(r)).sum::<f64>() / n_observed
    };

    let total       = labels.len();
    let correct: usize = tp.iter().sum();
    let weighted_f1 = per_class
        .iter()
        .map(|r| r.f1 * r.support as f64)
        .sum::<f64>()
        / total as f64;

    Ok(ClassificationReport {
        accuracy:        ratio(correct, total),
        macro_precision: macro_of(|r| r.precision),
        macro_recall:    macro_of(|r| r.recall),
        macro_f1:        macro_of(|r| r.f1),
        weighted_f1,
        total,
        per_class,
    })
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .per_class
            .iter()
            .map(|r| r.name.len())
            .max()
            .unwrap_or(0)
            .max("weighted avg".len());

        writeln!(f, "{:>width$}  {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for r in &self.per_class {
            writeln!(
                f,
                "{:>width$}  {:>9.3} {:>9.3} {:>9.3} {:>9}",
                r.name, r.precision, r.recall, r.f1, r.support
            )?;
        }
        writeln!(f)?;
        writeln!(f, "{:>width$}  {:>9} {:>9} {:>9.3} {:>9}", "accuracy", "", "", self.accuracy, self.total)?;
        writeln!(
            f,
            "{:>width$}  {:>9.3} {:>9.3} {:>9.3} {:>9}",
            "macro avg", self.macro_precision, self.macro_recall, self.macro_f1, self.total
        )?;
        write!(f, "{:>width$}  {:>9} {:>9} {:>9.3} {:>9}", "weighted avg", "", "", self.weighted_f1, self.total)
    }
}

// ─── ValidationReport ─────────────────────────────────────────────────────────
/// Loss/accuracy of a validation pass plus its classification report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub metrics: EpochMetrics,
    pub report:  ClassificationReport,
}

impl ValidationReport {
    pub fn new(
        metrics:     EpochMetrics,
        labels:      &[usize],
        predictions: &[usize],
        class_names: &[String],
    ) -> Result<Self, TrainError> {
        let report = evaluate(labels, predictions, class_names)?;
        Ok(Self { metrics, report })
    }

    pub fn macro_f1(&self) -> f64 {
        self.report.macro_f1
    }
}
