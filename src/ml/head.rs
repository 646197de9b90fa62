// ============================================================
// PredictionHead Contract
// ============================================================
// Every task head turns encoder embeddings into logits and
// then, depending on the phase:
//
//   training   logits -> logits_to_loss   -> per-sample loss
//   eval       logits -> logits_to_preds  vs prepare_labels
//   inference  logits -> formatted_preds  -> prediction records
//
// The four variants disagree on almost every shape (pooled vs
// per-token input, single vs paired logits, which masks they
// need), so those are associated types rather than one shared
// "kwargs" bag. See data::batch for the label / feature types.

use burn::prelude::*;

use crate::domain::{FormattedPreds, LabelMap, Sample};
use crate::error::Result;
use crate::ml::registry::{HeadConfig, HeadKind};

pub trait PredictionHead<B: Backend> {
    /// Encoder output this head reads.
    type Input;
    /// Raw scores produced by `forward`.
    type Logits: Clone;
    /// Ground truth needed by the loss.
    type Labels;
    /// Side inputs needed to decode logits (masks, segment ids).
    type Features;
    /// Task-shaped predictions; also the shape of prepared labels.
    type Preds;

    fn kind(&self) -> HeadKind;

    /// Architecture description sufficient to rebuild this head
    /// without its weights.
    fn config(&self) -> HeadConfig;

    fn forward(&self, input: Self::Input) -> Self::Logits;

    /// Unreduced loss. Sequence-level heads return one value per
    /// sample; the token head returns one value per active token.
    fn logits_to_loss(&self, logits: Self::Logits, labels: &Self::Labels) -> Result<Tensor<B, 1>>;

    fn logits_to_preds(
        &self,
        logits:    Self::Logits,
        features:  &Self::Features,
        label_map: &LabelMap,
    ) -> Result<Self::Preds>;

    /// Ground truth in the same structure `logits_to_preds` returns,
    /// for like-for-like comparison.
    fn prepare_labels(&self, labels: &Self::Labels, label_map: &LabelMap) -> Result<Self::Preds>;

    fn formatted_preds(
        &self,
        logits:    Self::Logits,
        features:  &Self::Features,
        samples:   &[Sample],
        label_map: &LabelMap,
    ) -> Result<FormattedPreds>;
}
