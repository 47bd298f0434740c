// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// The three failure classes a training run can hit:
//
//   Configuration — the architecture cannot be built for the
//                   requested input resolution (a stage of the
//                   conv stack collapses to a non-positive size)
//   Data          — missing/empty data directory, empty split,
//                   mismatched class sets, bad label indices
//   Numerical     — the training loss stopped being finite
//
// All three are fatal. Upper layers wrap them in anyhow::Error,
// so tests and callers recover the kind with downcast_ref.
//
// Reference: thiserror crate documentation
//            Rust Book §9 (Error Handling)

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrainError {
    /// Invalid architecture or run parameters, detected before training
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Missing, empty or inconsistent data
    #[error("data error: {0}")]
    Data(String),

    /// Non-finite loss while training
    #[error("numerical error: loss became {loss} at epoch {epoch}, batch {batch}")]
    Numerical {
        epoch: usize,
        batch: usize,
        loss:  f64,
    },
}

impl TrainError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrainError::data("validation set is empty");
        assert_eq!(err.to_string(), "data error: validation set is empty");
    }

    #[test]
    fn test_numerical_display_mentions_position() {
        let err = TrainError::Numerical { epoch: 2, batch: 7, loss: f64::NAN };
        let msg = err.to_string();
        assert!(msg.contains("epoch 2"));
        assert!(msg.contains("batch 7"));
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = TrainError::configuration("too small").into();
        assert!(matches!(
            err.downcast_ref::<TrainError>(),
            Some(TrainError::Configuration(_))
        ));
    }
}
