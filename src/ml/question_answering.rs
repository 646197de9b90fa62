// ============================================================
// Question Answering Head
// ============================================================
// Extractive QA: the answer is a span of context tokens. The
// head scores every token as a possible start and end:
//
//   [batch, seq_len, hidden] -> FeedForwardBlock -> [batch, seq_len, 2]
//                            -> start_logits [batch, seq_len]
//                               end_logits   [batch, seq_len]
//
// Inputs are packed as [question tokens, context tokens], so
// predicted indices are shifted back into the context before
// the answer text is rebuilt.
//
// Reference: Devlin et al. (2019) BERT, §4.2 SQuAD

use burn::prelude::*;

use crate::data::alignment::{context_span, context_start, join_answer};
use crate::data::{SpanFeatures, SpanLabels};
use crate::domain::{FormattedPreds, LabelMap, PredictionRecord, Probability, Sample};
use crate::error::{ensure_aligned, HeadError};
use crate::ml::feed_forward::{FeedForwardBlock, FeedForwardBlockConfig};
use crate::ml::head::PredictionHead;
use crate::ml::loss::cross_entropy_per_sample;
use crate::ml::readback;
use crate::ml::registry::{HeadConfig, HeadKind, OutputType};

#[derive(Config, Debug)]
pub struct QuestionAnsweringHeadConfig {
    /// e.g. [768, 2]; the output width must be 2 (start, end).
    pub layer_dims: Vec<usize>,
    #[config(default = "OutputType::PerTokenSquad")]
    pub ph_output_type: OutputType,
}

impl QuestionAnsweringHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> crate::Result<QuestionAnsweringHead<B>> {
        HeadKind::QuestionAnswering.check_output_type(self.ph_output_type)?;
        if self.layer_dims.last() != Some(&2) {
            return Err(HeadError::InvalidConfig(format!(
                "question answering needs a start and an end score per token, layer_dims {:?} ends in {:?}",
                self.layer_dims,
                self.layer_dims.last()
            )));
        }
        let feed_forward = FeedForwardBlockConfig::new(self.layer_dims.clone()).init(device)?;
        Ok(QuestionAnsweringHead { feed_forward })
    }
}

#[derive(Module, Debug)]
pub struct QuestionAnsweringHead<B: Backend> {
    feed_forward: FeedForwardBlock<B>,
}

#[derive(Debug, Clone)]
pub struct QaLogits<B: Backend> {
    /// shape: [batch_size, seq_len]
    pub start_logits: Tensor<B, 2>,
    /// shape: [batch_size, seq_len]
    pub end_logits: Tensor<B, 2>,
}

/// Answer start and end token indices (inclusive) in the packed sequence.
/// Negative ground-truth positions are clamped to 0 when prepared as labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanIndices {
    pub start: usize,
    pub end:   usize,
}

fn span_indices(starts: Vec<i64>, ends: Vec<i64>) -> Vec<SpanIndices> {
    readback::indices(starts)
        .into_iter()
        .zip(readback::indices(ends))
        .map(|(start, end)| SpanIndices { start, end })
        .collect()
}

impl<B: Backend> PredictionHead<B> for QuestionAnsweringHead<B> {
    type Input    = Tensor<B, 3>;
    type Logits   = QaLogits<B>;
    type Labels   = SpanLabels<B>;
    type Features = SpanFeatures<B>;
    type Preds    = Vec<SpanIndices>;

    fn kind(&self) -> HeadKind {
        HeadKind::QuestionAnswering
    }

    fn config(&self) -> HeadConfig {
        HeadConfig::QuestionAnswering(QuestionAnsweringHeadConfig::new(self.feed_forward.layer_dims()))
    }

    fn forward(&self, input: Tensor<B, 3>) -> QaLogits<B> {
        let [batch_size, seq_len, _] = input.dims();
        let logits = self.feed_forward.forward(input); // [batch, seq_len, 2]

        let start_logits = logits
            .clone()
            .slice([0..batch_size, 0..seq_len, 0..1])
            .reshape([batch_size, seq_len]);
        let end_logits = logits
            .slice([0..batch_size, 0..seq_len, 1..2])
            .reshape([batch_size, seq_len]);

        QaLogits { start_logits, end_logits }
    }

    /// Positions are clamped into `[0, seq_len]`. `seq_len` is the ignore
    /// index, so positions past the sequence add no loss while negative
    /// ones count as position 0. Per-sample loss is the mean of the start
    /// and end losses.
    fn logits_to_loss(&self, logits: QaLogits<B>, labels: &SpanLabels<B>) -> crate::Result<Tensor<B, 1>> {
        let [batch_size, seq_len] = logits.start_logits.dims();
        ensure_aligned("start positions", batch_size, labels.start_positions.dims()[0])?;
        ensure_aligned("end positions", batch_size, labels.end_positions.dims()[0])?;

        let ignored_index = seq_len as i64;
        let start_positions = labels.start_positions.clone().clamp(0, ignored_index);
        let end_positions = labels.end_positions.clone().clamp(0, ignored_index);

        let start_loss = cross_entropy_per_sample(logits.start_logits, start_positions, None, Some(ignored_index));
        let end_loss = cross_entropy_per_sample(logits.end_logits, end_positions, None, Some(ignored_index));

        Ok((start_loss + end_loss) / 2.0)
    }

    /// Independent argmax of start and end; `end >= start` is not enforced.
    fn logits_to_preds(&self, logits: QaLogits<B>, _: &SpanFeatures<B>, _: &LabelMap) -> crate::Result<Vec<SpanIndices>> {
        let [batch_size, _] = logits.start_logits.dims();
        let starts = readback::ints(logits.start_logits.argmax(1).reshape([batch_size]))?;
        let ends = readback::ints(logits.end_logits.argmax(1).reshape([batch_size]))?;
        Ok(span_indices(starts, ends))
    }

    fn prepare_labels(&self, labels: &SpanLabels<B>, _: &LabelMap) -> crate::Result<Vec<SpanIndices>> {
        let starts = readback::ints(labels.start_positions.clone())?;
        let ends = readback::ints(labels.end_positions.clone())?;
        ensure_aligned("end positions", starts.len(), ends.len())?;
        Ok(span_indices(starts, ends))
    }

    /// Answer text comes from context-local (shifted) indices. The char
    /// offsets on the record are looked up with the packed (unshifted)
    /// indices; an index past the offset table leaves the field unset.
    /// No confidence is computed yet.
    fn formatted_preds(
        &self,
        logits:    QaLogits<B>,
        features:  &SpanFeatures<B>,
        samples:   &[Sample],
        label_map: &LabelMap,
    ) -> crate::Result<FormattedPreds> {
        let preds = self.logits_to_preds(logits, features, label_map)?;
        let [_, seq_len] = features.segment_ids.dims();
        let segments = readback::rows(&readback::ints(features.segment_ids.clone())?, seq_len);

        ensure_aligned("segment id rows", preds.len(), segments.len())?;
        ensure_aligned("prediction contexts", preds.len(), samples.len())?;

        let mut res = FormattedPreds::new(HeadKind::QuestionAnswering.task());
        for ((pred, segment_ids), sample) in preds.iter().zip(&segments).zip(samples) {
            let span = context_span(pred.start, pred.end, context_start(segment_ids));
            let offsets = sample.tokenized.offsets();

            res.predictions.push(PredictionRecord {
                start:       offsets.get(pred.start).copied(),
                end:         offsets.get(pred.end).copied(),
                context:     sample.question_text()?.to_string(),
                label:       join_answer(sample.tokenized.tokens(), span.start, span.slice_end),
                probability: Probability::Unavailable,
            });
        }
        Ok(res)
    }
}
