// ============================================================
// Head Label and Feature Batches
// ============================================================
// Each head needs different ground truth for its loss and
// different side inputs to decode its logits. These structs
// carry exactly those tensors, all with batch_size as their
// first dimension.
//
//   head                 labels (loss)           features (decode)
//   text classification  SequenceLabels          ()
//   token classification TokenLabels             TokenFeatures
//   masked LM            LmLabels                LmLabels
//   question answering   SpanLabels              SpanFeatures
//
// Masks are Int tensors holding 0 / 1, like an attention mask.
//
// Reference: Burn Book §4 (Batcher)

use burn::prelude::*;

/// One class id per sequence.
#[derive(Debug, Clone)]
pub struct SequenceLabels<B: Backend> {
    /// shape: [batch_size]
    pub label_ids: Tensor<B, 1, Int>,
}

/// One label id per token plus the masks that select which tokens count.
#[derive(Debug, Clone)]
pub struct TokenLabels<B: Backend> {
    /// shape: [batch_size, seq_len]
    pub label_ids: Tensor<B, 2, Int>,

    /// 1 = first subword of a word. shape: [batch_size, seq_len]
    pub initial_mask: Tensor<B, 2, Int>,

    /// 1 = real token, 0 = padding. shape: [batch_size, seq_len]
    pub padding_mask: Tensor<B, 2, Int>,
}

impl<B: Backend> TokenLabels<B> {
    pub fn features(&self) -> TokenFeatures<B> {
        TokenFeatures { initial_mask: self.initial_mask.clone() }
    }
}

#[derive(Debug, Clone)]
pub struct TokenFeatures<B: Backend> {
    /// 1 = first subword of a word. shape: [batch_size, seq_len]
    pub initial_mask: Tensor<B, 2, Int>,
}

/// Target vocabulary ids per position; `LM_IGNORE_INDEX` marks
/// positions that were not masked.
#[derive(Debug, Clone)]
pub struct LmLabels<B: Backend> {
    /// shape: [batch_size, seq_len]
    pub lm_label_ids: Tensor<B, 2, Int>,
}

/// Answer start and end token positions in the packed sequence.
#[derive(Debug, Clone)]
pub struct SpanLabels<B: Backend> {
    /// shape: [batch_size]
    pub start_positions: Tensor<B, 1, Int>,
    /// shape: [batch_size]
    pub end_positions: Tensor<B, 1, Int>,
}

impl<B: Backend> SpanLabels<B> {
    pub fn new(start_positions: Tensor<B, 1, Int>, end_positions: Tensor<B, 1, Int>) -> Self {
        Self { start_positions, end_positions }
    }

    /// Accept positions shaped [batch_size, 1], as data loaders often
    /// produce them, and flatten to [batch_size].
    pub fn from_columns(start_positions: Tensor<B, 2, Int>, end_positions: Tensor<B, 2, Int>) -> Self {
        Self {
            start_positions: start_positions.flatten::<1>(0, 1),
            end_positions:   end_positions.flatten::<1>(0, 1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpanFeatures<B: Backend> {
    /// 0 = question token, nonzero = context token. shape: [batch_size, seq_len]
    pub segment_ids: Tensor<B, 2, Int>,
}
