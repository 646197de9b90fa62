// ============================================================
// Text Classification Head
// ============================================================
// One label per sequence, read from the pooled embedding:
//
//   [batch, hidden] -> FeedForwardBlock -> [batch, num_labels]
//
// Loss is cross entropy per sample, optionally class-weighted
// to counter label imbalance. Samples labelled with the ignore
// index contribute zero loss.

use burn::{module::Ignored, prelude::*, tensor::activation::softmax};

use crate::data::SequenceLabels;
use crate::domain::{FormattedPreds, LabelMap, PredictionRecord, Probability, Sample};
use crate::error::{ensure_aligned, HeadError};
use crate::ml::feed_forward::{FeedForwardBlock, FeedForwardBlockConfig};
use crate::ml::head::PredictionHead;
use crate::ml::loss::cross_entropy_per_sample;
use crate::ml::readback;
use crate::ml::registry::{HeadConfig, HeadKind, OutputType};

/// Label value that contributes no loss.
pub const LOSS_IGNORE_INDEX: i64 = -100;

#[derive(Config, Debug)]
pub struct TextClassificationHeadConfig {
    /// e.g. [768, 2]; the last entry is the number of classes.
    pub layer_dims: Vec<usize>,
    /// One weight per class.
    #[config(default = "None")]
    pub class_weights: Option<Vec<f32>>,
    #[config(default = "LOSS_IGNORE_INDEX")]
    pub loss_ignore_index: i64,
    #[config(default = "OutputType::PerSequence")]
    pub ph_output_type: OutputType,
}

impl TextClassificationHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> crate::Result<TextClassificationHead<B>> {
        HeadKind::TextClassification.check_output_type(self.ph_output_type)?;
        let feed_forward = FeedForwardBlockConfig::new(self.layer_dims.clone()).init(device)?;
        let num_labels = feed_forward.output_size();

        if let Some(weights) = &self.class_weights {
            if weights.len() != num_labels {
                return Err(HeadError::InvalidConfig(format!(
                    "{} class weights for {} classes",
                    weights.len(),
                    num_labels
                )));
            }
        }

        Ok(TextClassificationHead {
            feed_forward,
            class_weights: Ignored(self.class_weights.clone()),
            num_labels,
            loss_ignore_index: self.loss_ignore_index,
        })
    }
}

#[derive(Module, Debug)]
pub struct TextClassificationHead<B: Backend> {
    feed_forward:      FeedForwardBlock<B>,
    class_weights:     Ignored<Option<Vec<f32>>>,
    num_labels:        usize,
    loss_ignore_index: i64,
}

impl<B: Backend> TextClassificationHead<B> {
    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    /// Softmax confidence of the predicted class, per sample.
    pub fn logits_to_probs(&self, logits: Tensor<B, 2>) -> crate::Result<Vec<f32>> {
        let [batch_size, _] = logits.dims();
        let probs = softmax(logits, 1).max_dim(1).reshape([batch_size]);
        readback::floats(probs)
    }

    fn labels_for(ids: Vec<i64>, label_map: &LabelMap) -> crate::Result<Vec<String>> {
        ids.into_iter()
            .map(|id| label_map.label(id).map(str::to_string))
            .collect()
    }
}

impl<B: Backend> PredictionHead<B> for TextClassificationHead<B> {
    type Input    = Tensor<B, 2>;
    type Logits   = Tensor<B, 2>;
    type Labels   = SequenceLabels<B>;
    type Features = ();
    type Preds    = Vec<String>;

    fn kind(&self) -> HeadKind {
        HeadKind::TextClassification
    }

    fn config(&self) -> HeadConfig {
        HeadConfig::TextClassification(
            TextClassificationHeadConfig::new(self.feed_forward.layer_dims())
                .with_class_weights(self.class_weights.0.clone())
                .with_loss_ignore_index(self.loss_ignore_index),
        )
    }

    fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.feed_forward.forward(input)
    }

    fn logits_to_loss(&self, logits: Tensor<B, 2>, labels: &SequenceLabels<B>) -> crate::Result<Tensor<B, 1>> {
        let [batch_size, _] = logits.dims();
        ensure_aligned("sequence labels", batch_size, labels.label_ids.dims()[0])?;

        let weights = self
            .class_weights
            .0
            .as_ref()
            .map(|w| Tensor::<B, 1>::from_floats(w.as_slice(), &logits.device()));

        Ok(cross_entropy_per_sample(
            logits,
            labels.label_ids.clone(),
            weights,
            Some(self.loss_ignore_index),
        ))
    }

    fn logits_to_preds(&self, logits: Tensor<B, 2>, _: &(), label_map: &LabelMap) -> crate::Result<Vec<String>> {
        let [batch_size, _] = logits.dims();
        let pred_ids = readback::ints(logits.argmax(1).reshape([batch_size]))?;
        Self::labels_for(pred_ids, label_map)
    }

    fn prepare_labels(&self, labels: &SequenceLabels<B>, label_map: &LabelMap) -> crate::Result<Vec<String>> {
        Self::labels_for(readback::ints(labels.label_ids.clone())?, label_map)
    }

    fn formatted_preds(
        &self,
        logits:    Tensor<B, 2>,
        _:         &(),
        samples:   &[Sample],
        label_map: &LabelMap,
    ) -> crate::Result<FormattedPreds> {
        let preds = self.logits_to_preds(logits.clone(), &(), label_map)?;
        let probs = self.logits_to_probs(logits)?;
        ensure_aligned("prediction probabilities", preds.len(), probs.len())?;
        ensure_aligned("prediction contexts", preds.len(), samples.len())?;

        let mut res = FormattedPreds::new(HeadKind::TextClassification.task());
        res.predictions = preds
            .into_iter()
            .zip(probs)
            .zip(samples)
            .map(|((label, prob), sample)| PredictionRecord {
                start:       None,
                end:         None,
                context:     sample.text().to_string(),
                label,
                probability: Probability::Score(prob),
            })
            .collect();
        Ok(res)
    }
}
