// ============================================================
// Per-Sample Cross Entropy
// ============================================================
// burn's CrossEntropyLoss always reduces to a mean. The heads
// need the unreduced loss (one value per row) so callers can
// weight, mask or average it themselves.
//
//   loss_i = -w[y_i] * log_softmax(logits_i)[y_i]
//   loss_i = 0                  if y_i == ignore_index
//
// Ignored rows are gathered at class 0 and then zeroed, so an
// ignore index outside the class range (e.g. -100, or seq_len
// for QA) never indexes out of bounds.
//
// Reference: PyTorch CrossEntropyLoss(reduction="none")

use burn::{prelude::*, tensor::activation::log_softmax};

/// Unreduced cross entropy.
///
/// * `logits`       - [n, num_classes]
/// * `targets`      - [n] class ids
/// * `weights`      - optional [num_classes] per-class weights
/// * `ignore_index` - target value that contributes zero loss
///
/// Returns [n].
pub fn cross_entropy_per_sample<B: Backend>(
    logits:       Tensor<B, 2>,
    targets:      Tensor<B, 1, Int>,
    weights:      Option<Tensor<B, 1>>,
    ignore_index: Option<i64>,
) -> Tensor<B, 1> {
    let [n, _] = logits.dims();

    let ignored = ignore_index.map(|index| targets.clone().equal_elem(index));
    let targets = match &ignored {
        Some(mask) => targets.mask_fill(mask.clone(), 0),
        None => targets,
    };

    let log_probs = log_softmax(logits, 1);
    let mut loss = log_probs
        .gather(1, targets.clone().reshape([n, 1]))
        .reshape([n])
        .neg();

    if let Some(weights) = weights {
        loss = loss * weights.select(0, targets);
    }
    match ignored {
        Some(mask) => loss.mask_fill(mask, 0.0),
        None => loss,
    }
}
