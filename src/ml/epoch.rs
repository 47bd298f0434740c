// ============================================================
// Layer 5 — Epoch Runner
// ============================================================
// One full pass over a batch source, in one of two flavours.
//
// Training pass (AutodiffBackend):
//   for each batch:
//     logits = model(images, Train)      dropout active
//     loss   = cross_entropy(logits, targets)
//     grads  = loss.backward()
//     model  = optimizer.step(lr, model, grads)
//   Gradients are consumed by the step, so nothing carries over
//   into the next batch.
//
// Evaluation pass (InnerBackend, i.e. after model.valid()):
//   no autograd graph at all, dropout off, model borrowed
//   immutably. Also collects every label and prediction so the
//   classification report can be computed over the whole pass.
//
// Both passes weight the loss by batch size, so a short last
// batch counts for exactly as many samples as it has.
//
// Reference: Burn Book §5 (Custom Training Loop)

use burn::{
    nn::loss::CrossEntropyLossConfig,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::ImageBatch;
use crate::domain::{
    error::TrainError,
    metrics::{EpochMetrics, MetricsAccumulator},
};
use crate::ml::model::{Mode, TumorClassifier};

/// Result of an evaluation pass.
#[derive(Debug, Clone)]
pub struct EvalPass {
    pub metrics:     EpochMetrics,
    pub labels:      Vec<usize>,
    pub predictions: Vec<usize>,
}

fn count_correct<B: Backend>(preds: &Tensor<B, 1, Int>, targets: &Tensor<B, 1, Int>) -> usize {
    let correct: i64 = preds
        .clone()
        .equal(targets.clone())
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>();
    correct as usize
}

/// argmax(1) returns [batch, 1]; flatten to [batch] before comparing
fn predicted_classes<B: Backend>(logits: Tensor<B, 2>) -> Tensor<B, 1, Int> {
    logits.argmax(1).flatten::<1>(0, 1)
}

fn to_indices<B: Backend>(t: Tensor<B, 1, Int>) -> Vec<usize> {
    t.into_data().iter::<i64>().map(|v| v as usize).collect()
}

/// Train `model` for one epoch and return the updated model.
///
/// `epoch` is only used to label a `TrainError::Numerical`.
pub fn train_epoch<B, O, I>(
    mut model: TumorClassifier<B>,
    optim:     &mut O,
    batches:   I,
    lr:        f64,
    epoch:     usize,
) -> Result<(TumorClassifier<B>, EpochMetrics), TrainError>
where
    B: AutodiffBackend,
    O: Optimizer<TumorClassifier<B>, B>,
    I: IntoIterator<Item = ImageBatch<B>>,
{
    let mut acc = MetricsAccumulator::new();

    for (batch_idx, batch) in batches.into_iter().enumerate() {
        let batch_size = batch.len();
        if batch_size == 0 {
            continue;
        }

        let (loss, logits) = model.forward_loss(batch.images, batch.targets.clone());

        let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
        if !loss_val.is_finite() {
            return Err(TrainError::Numerical { epoch, batch: batch_idx, loss: loss_val });
        }

        let correct = count_correct(&predicted_classes(logits), &batch.targets);

        // Backward pass + optimizer update
        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        model = optim.step(lr, model, grads);

        acc.record(loss_val, batch_size, correct);
        tracing::trace!(epoch, batch = batch_idx, loss = loss_val, "train batch");
    }

    let metrics = acc.finish()?;
    Ok((model, metrics))
}

/// Evaluate `model` over every batch without touching its parameters.
pub fn evaluate_epoch<B, I>(model: &TumorClassifier<B>, batches: I) -> Result<EvalPass, TrainError>
where
    B: Backend,
    I: IntoIterator<Item = ImageBatch<B>>,
{
    let mut acc         = MetricsAccumulator::new();
    let mut labels      = Vec::new();
    let mut predictions = Vec::new();

    for batch in batches {
        let batch_size = batch.len();
        if batch_size == 0 {
            continue;
        }

        let logits = model.forward(batch.images, Mode::Eval);
        let ce     = CrossEntropyLossConfig::new().init(&logits.device());
        let loss: f64 = ce
            .forward(logits.clone(), batch.targets.clone())
            .into_scalar()
            .elem::<f64>();

        let preds   = predicted_classes(logits);
        let correct = count_correct(&preds, &batch.targets);

        labels.extend(to_indices(batch.targets));
        predictions.extend(to_indices(preds));
        acc.record(loss, batch_size, correct);
    }

    let metrics = acc.finish()?;
    Ok(EvalPass { metrics, labels, predictions })
}
