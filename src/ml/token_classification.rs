// ============================================================
// Token Classification Head
// ============================================================
// One tag per token (e.g. named entities):
//
//   [batch, seq_len, hidden] -> FeedForwardBlock
//                            -> [batch, seq_len, num_labels]
//
// Subword tokenisation splits words into pieces; only the first
// piece of each word carries the label. Predictions, their
// confidences and the ground truth are all reduced to those
// word-initial positions so they stay word-aligned, and then
// mapped back onto char spans of the original text.
//
// Loss is computed over every real (non-padding) token, one
// value per active token concatenated across the batch.

use burn::{prelude::*, tensor::activation::softmax};

use crate::data::alignment::{initial_token_only, word_spans};
use crate::data::{IobSpanMerger, TokenFeatures, TokenLabels};
use crate::domain::{
    CharSpan, FormattedPreds, LabelMap, PredictionRecord, Probability, Sample, SpanMerger,
};
use crate::error::ensure_aligned;
use crate::ml::feed_forward::{FeedForwardBlock, FeedForwardBlockConfig};
use crate::ml::head::PredictionHead;
use crate::ml::loss::cross_entropy_per_sample;
use crate::ml::readback;
use crate::ml::registry::{HeadConfig, HeadKind, OutputType};
use crate::ml::text_classification::LOSS_IGNORE_INDEX;

#[derive(Config, Debug)]
pub struct TokenClassificationHeadConfig {
    /// e.g. [768, 9]; the last entry is the number of tags.
    pub layer_dims: Vec<usize>,
    #[config(default = "LOSS_IGNORE_INDEX")]
    pub loss_ignore_index: i64,
    #[config(default = "OutputType::PerToken")]
    pub ph_output_type: OutputType,
}

impl TokenClassificationHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> crate::Result<TokenClassificationHead<B>> {
        HeadKind::TokenClassification.check_output_type(self.ph_output_type)?;
        let feed_forward = FeedForwardBlockConfig::new(self.layer_dims.clone()).init(device)?;
        let num_labels = feed_forward.output_size();
        Ok(TokenClassificationHead {
            feed_forward,
            num_labels,
            loss_ignore_index: self.loss_ignore_index,
        })
    }
}

#[derive(Module, Debug)]
pub struct TokenClassificationHead<B: Backend> {
    feed_forward:      FeedForwardBlock<B>,
    num_labels:        usize,
    loss_ignore_index: i64,
}

impl<B: Backend> TokenClassificationHead<B> {
    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    /// Softmax confidence of the predicted tag, per word.
    pub fn logits_to_probs(&self, logits: Tensor<B, 3>, features: &TokenFeatures<B>) -> crate::Result<Vec<Vec<f32>>> {
        let [batch_size, seq_len, _] = logits.dims();
        let token_probs = softmax(logits, 2).max_dim(2).reshape([batch_size, seq_len]);
        let token_probs = readback::rows(&readback::floats(token_probs)?, seq_len);
        let initial_mask = readback::mask_rows(features.initial_mask.clone())?;
        ensure_aligned("initial mask rows", batch_size, initial_mask.len())?;

        token_probs
            .iter()
            .zip(&initial_mask)
            .map(|(probs, mask)| initial_token_only(probs, mask))
            .collect()
    }

    /// Like `formatted_preds`, with a caller-chosen merging policy.
    pub fn formatted_preds_with(
        &self,
        logits:    Tensor<B, 3>,
        features:  &TokenFeatures<B>,
        samples:   &[Sample],
        label_map: &LabelMap,
        merger:    &impl SpanMerger,
    ) -> crate::Result<FormattedPreds> {
        let preds = self.logits_to_preds(logits.clone(), features, label_map)?;
        let probs = self.logits_to_probs(logits, features)?;
        let spans: Vec<Vec<CharSpan>> = samples.iter().map(|s| word_spans(&s.tokenized)).collect();

        ensure_aligned("prediction probabilities", preds.len(), probs.len())?;
        ensure_aligned("prediction spans", preds.len(), spans.len())?;

        let mut res = FormattedPreds::new(HeadKind::TokenClassification.task());
        for (((word_tags, word_probs), spans_seq), sample) in preds.iter().zip(&probs).zip(&spans).zip(samples) {
            ensure_aligned("word probabilities", word_tags.len(), word_probs.len())?;
            let merged = merger.merge(word_tags, spans_seq)?;

            for (k, (tag, span)) in merged.tags.into_iter().zip(merged.spans).enumerate() {
                // confidence of the entity's first word, found by span start
                // rather than by pairing merged entities with words by position
                let word = spans_seq.iter().position(|w| w.start == span.start).unwrap_or(k);
                let probability = word_probs
                    .get(word)
                    .map_or(Probability::Unavailable, |&p| Probability::Score(p));

                res.predictions.push(PredictionRecord {
                    start: Some(span.start),
                    end: Some(span.end),
                    context: span.slice(sample.text()),
                    label: tag,
                    probability,
                });
            }
        }
        Ok(res)
    }

    fn word_labels(
        ids:       &[i64],
        seq_len:   usize,
        mask:      Tensor<B, 2, Int>,
        label_map: &LabelMap,
    ) -> crate::Result<Vec<Vec<String>>> {
        let initial_mask = readback::mask_rows(mask)?;
        let ids = readback::rows(ids, seq_len);
        ensure_aligned("initial mask rows", ids.len(), initial_mask.len())?;

        ids.iter()
            .zip(&initial_mask)
            .map(|(row, mask)| {
                initial_token_only(row, mask)?
                    .into_iter()
                    .map(|id| label_map.label(id).map(str::to_string))
                    .collect()
            })
            .collect()
    }
}

impl<B: Backend> PredictionHead<B> for TokenClassificationHead<B> {
    type Input    = Tensor<B, 3>;
    type Logits   = Tensor<B, 3>;
    type Labels   = TokenLabels<B>;
    type Features = TokenFeatures<B>;
    type Preds    = Vec<Vec<String>>;

    fn kind(&self) -> HeadKind {
        HeadKind::TokenClassification
    }

    fn config(&self) -> HeadConfig {
        HeadConfig::TokenClassification(
            TokenClassificationHeadConfig::new(self.feed_forward.layer_dims())
                .with_loss_ignore_index(self.loss_ignore_index),
        )
    }

    fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        self.feed_forward.forward(input)
    }

    fn logits_to_loss(&self, logits: Tensor<B, 3>, labels: &TokenLabels<B>) -> crate::Result<Tensor<B, 1>> {
        let [batch_size, seq_len, num_labels] = logits.dims();
        let device = logits.device();
        let [mask_batch, mask_len] = labels.padding_mask.dims();
        ensure_aligned("padding mask batch", batch_size, mask_batch)?;
        ensure_aligned("padding mask length", seq_len, mask_len)?;

        let active: Vec<i64> = readback::ints(labels.padding_mask.clone())?
            .into_iter()
            .enumerate()
            .filter(|(_, m)| *m == 1)
            .map(|(i, _)| i as i64)
            .collect();
        tracing::debug!("token loss over {} of {} positions", active.len(), batch_size * seq_len);
        if active.is_empty() {
            return Ok(Tensor::zeros([0], &device));
        }

        let active = Tensor::<B, 1, Int>::from_ints(active.as_slice(), &device);
        let active_logits = logits
            .reshape([batch_size * seq_len, num_labels])
            .select(0, active.clone());
        let active_labels = labels
            .label_ids
            .clone()
            .reshape([batch_size * seq_len])
            .select(0, active);

        Ok(cross_entropy_per_sample(
            active_logits,
            active_labels,
            None,
            Some(self.loss_ignore_index),
        ))
    }

    fn logits_to_preds(
        &self,
        logits:    Tensor<B, 3>,
        features:  &TokenFeatures<B>,
        label_map: &LabelMap,
    ) -> crate::Result<Vec<Vec<String>>> {
        let [batch_size, seq_len, _] = logits.dims();
        let pred_ids = readback::ints(logits.argmax(2).reshape([batch_size, seq_len]))?;
        Self::word_labels(&pred_ids, seq_len, features.initial_mask.clone(), label_map)
    }

    fn prepare_labels(&self, labels: &TokenLabels<B>, label_map: &LabelMap) -> crate::Result<Vec<Vec<String>>> {
        let [_, seq_len] = labels.label_ids.dims();
        let ids = readback::ints(labels.label_ids.clone())?;
        Self::word_labels(&ids, seq_len, labels.initial_mask.clone(), label_map)
    }

    fn formatted_preds(
        &self,
        logits:    Tensor<B, 3>,
        features:  &TokenFeatures<B>,
        samples:   &[Sample],
        label_map: &LabelMap,
    ) -> crate::Result<FormattedPreds> {
        self.formatted_preds_with(logits, features, samples, label_map, &IobSpanMerger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TokenizedText;
    use crate::error::HeadError;
    use burn::backend::NdArray;

    type TB = NdArray;

    const O: usize = 0;
    const B_PER: usize = 1;
    const I_PER: usize = 2;

    fn head() -> TokenClassificationHead<TB> {
        TokenClassificationHeadConfig::new(vec![4, 3]).init(&Default::default()).unwrap()
    }

    fn label_map() -> LabelMap {
        LabelMap::new(["O", "B-PER", "I-PER"]).unwrap()
    }

    /// Logits of shape [1, len] peaked at the given tag per position.
    fn peaked(tags: &[usize]) -> Tensor<TB, 3> {
        let flat: Vec<f32> = tags
            .iter()
            .flat_map(|&t| (0..3).map(move |c| if c == t { 4.0 } else { 0.0 }))
            .collect();
        Tensor::<TB, 1>::from_floats(flat.as_slice(), &Default::default()).reshape([1, tags.len(), 3])
    }

    fn mask(flags: &[i64]) -> Tensor<TB, 2, Int> {
        Tensor::<TB, 1, Int>::from_ints(flags, &Default::default()).reshape([1, flags.len()])
    }

    /// "John Smith went": Jo ##hn Smith went (the logits carry one extra padding position)
    fn sample() -> Sample {
        let tokens = ["Jo", "##hn", "Smith", "went"].iter().map(|s| s.to_string()).collect();
        let tokenized = TokenizedText::new(tokens, vec![0, 2, 5, 11], vec![true, false, true, true]).unwrap();
        Sample::new("s0", "John Smith went", tokenized)
    }

    #[test]
    fn test_forward_shape() {
        let logits = head().forward(Tensor::<TB, 3>::ones([2, 5, 4], &Default::default()));
        assert_eq!(logits.dims(), [2, 5, 3]);
    }

    #[test]
    fn test_loss_only_over_active_tokens() {
        let device = Default::default();
        let logits = Tensor::<TB, 3>::zeros([2, 3, 3], &device);
        let labels = TokenLabels {
            label_ids:    Tensor::from_ints([[0, 1, 2], [1, 0, 0]], &device),
            initial_mask: Tensor::from_ints([[1, 1, 1], [1, 1, 1]], &device),
            padding_mask: Tensor::from_ints([[1, 1, 0], [1, 0, 0]], &device),
        };
        let loss = head().logits_to_loss(logits, &labels).unwrap();
        assert_eq!(loss.dims(), [3]);
        let values: Vec<f32> = loss.into_data().to_vec().unwrap();
        for v in values {
            assert!((v - 3f32.ln()).abs() < 1e-5);
        }
    }

    #[test]
    fn test_token_loss_ignores_label_index() {
        let device = Default::default();
        let labels = TokenLabels {
            label_ids:    Tensor::from_ints([[0, LOSS_IGNORE_INDEX, 2]], &device),
            initial_mask: Tensor::from_ints([[1, 1, 1]], &device),
            padding_mask: Tensor::from_ints([[1, 1, 1]], &device),
        };
        let loss: Vec<f32> = head()
            .logits_to_loss(Tensor::zeros([1, 3, 3], &device), &labels)
            .unwrap()
            .into_data()
            .to_vec()
            .unwrap();

        let ln3 = 3f32.ln();
        assert_eq!(loss.len(), 3);
        assert!((loss[0] - ln3).abs() < 1e-5);
        assert_eq!(loss[1], 0.0);
        assert!((loss[2] - ln3).abs() < 1e-5);
    }

    #[test]
    fn test_loss_with_no_active_tokens_is_empty() {
        let device = Default::default();
        let labels = TokenLabels {
            label_ids:    Tensor::from_ints([[0, 1]], &device),
            initial_mask: Tensor::from_ints([[1, 1]], &device),
            padding_mask: Tensor::from_ints([[0, 0]], &device),
        };
        let loss = head().logits_to_loss(Tensor::zeros([1, 2, 3], &device), &labels).unwrap();
        assert_eq!(loss.dims(), [0]);
    }

    #[test]
    fn test_preds_keep_word_initial_tokens_only() {
        let logits = peaked(&[B_PER, I_PER, I_PER, O, O]);
        let features = TokenFeatures { initial_mask: mask(&[1, 0, 1, 1, 0]) };
        let preds = head().logits_to_preds(logits.clone(), &features, &label_map()).unwrap();
        assert_eq!(preds, vec![vec!["B-PER", "I-PER", "O"]]);

        let probs = head().logits_to_probs(logits, &features).unwrap();
        assert_eq!(probs[0].len(), 3);
    }

    #[test]
    fn test_prepare_labels_mirrors_preds() {
        let device = Default::default();
        let labels = TokenLabels {
            label_ids:    Tensor::from_ints([[1, 2, 2, 0, 0]], &device),
            initial_mask: mask(&[1, 0, 1, 1, 0]),
            padding_mask: mask(&[1, 1, 1, 1, 0]),
        };
        let prepared = head().prepare_labels(&labels, &label_map()).unwrap();
        assert_eq!(prepared, vec![vec!["B-PER", "I-PER", "O"]]);
    }

    #[test]
    fn test_formatted_preds_merges_entity_spans() {
        let logits = peaked(&[B_PER, I_PER, I_PER, O, O]);
        let features = TokenFeatures { initial_mask: mask(&[1, 0, 1, 1, 0]) };

        let res = head().formatted_preds(logits, &features, &[sample()], &label_map()).unwrap();
        assert_eq!(res.task, "ner");
        assert_eq!(res.predictions.len(), 1);

        let entity = &res.predictions[0];
        assert_eq!(entity.label, "PER");
        assert_eq!((entity.start, entity.end), (Some(0), Some(10)));
        assert_eq!(entity.context, "John Smith");
        assert!(entity.probability.score().unwrap() > 0.9);
    }

    #[test]
    fn test_formatted_preds_rejects_missing_samples() {
        let logits = peaked(&[O, O, O, O, O]);
        let features = TokenFeatures { initial_mask: mask(&[1, 0, 1, 1, 0]) };
        let err = head().formatted_preds(logits, &features, &[], &label_map()).unwrap_err();
        assert!(matches!(err, HeadError::Misaligned { what: "prediction spans", .. }));
    }
}
