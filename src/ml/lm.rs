// ============================================================
// Masked Language Model Head
// ============================================================
// Predicts the original token at masked positions by scoring
// every vocabulary entry:
//
//   [batch, seq_len, hidden]
//     -> dense + activation + layer norm      (transform)
//     -> x · Eᵀ + bias                        (tied decoder)
//     -> [batch, seq_len, vocab_size]
//
// E is the encoder's own token-embedding matrix. The head only
// borrows it: the lifetime 'e ties the head to the encoder, the
// encoder stays the single owner and writer, and the head never
// holds or persists a private copy that could drift.
//
// Consequences for persistence: save() writes the config only,
// and load() is unsupported because a head cannot be rebuilt
// without a live encoder to tie to.
//
// Reference: Devlin et al. (2019) BERT, §3.1 Masked LM
//            Press & Wolf (2017) Using the Output Embedding

use std::path::{Path, PathBuf};

use burn::{
    module::Param,
    nn::{Embedding, LayerNorm, LayerNormConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::{gelu, relu, softmax},
};
use serde::{Deserialize, Serialize};

use crate::data::LmLabels;
use crate::domain::{FormattedPreds, LabelMap, PredictionRecord, Probability, Sample};
use crate::error::{ensure_aligned, HeadError};
use crate::infra::head_store::HeadStore;
use crate::ml::head::PredictionHead;
use crate::ml::loss::cross_entropy_per_sample;
use crate::ml::readback;
use crate::ml::registry::{HeadConfig, HeadKind, OutputType};

/// Target id of positions that were not masked.
pub const LM_IGNORE_INDEX: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LmActivation {
    Gelu,
    Relu,
}

#[derive(Config, Debug)]
pub struct BertLmHeadConfig {
    pub hidden_size: usize,
    pub vocab_size:  usize,
    #[config(default = "LmActivation::Gelu")]
    pub hidden_act: LmActivation,
    #[config(default = 1e-12)]
    pub layer_norm_eps: f64,
    #[config(default = "OutputType::PerToken")]
    pub ph_output_type: OutputType,
}

impl BertLmHeadConfig {
    /// Build a head tied to `word_embeddings` ([vocab_size, hidden_size]).
    pub fn init<'e, B: Backend>(
        &self,
        word_embeddings: &'e Param<Tensor<B, 2>>,
        device:          &B::Device,
    ) -> crate::Result<BertLmHead<'e, B>> {
        HeadKind::BertLm.check_output_type(self.ph_output_type)?;
        let [vocab_size, hidden_size] = word_embeddings.val().dims();
        if [vocab_size, hidden_size] != [self.vocab_size, self.hidden_size] {
            return Err(HeadError::InvalidConfig(format!(
                "embedding matrix is [{vocab_size}, {hidden_size}], config expects [{}, {}]",
                self.vocab_size, self.hidden_size
            )));
        }

        let transform = LmTransform {
            dense:      LinearConfig::new(hidden_size, hidden_size).init(device),
            layer_norm: LayerNormConfig::new(hidden_size)
                .with_epsilon(self.layer_norm_eps)
                .init(device),
            bias:       Param::from_tensor(Tensor::zeros([vocab_size], device)),
        };

        tracing::info!("BertLMHead tied to {vocab_size}x{hidden_size} word embeddings");
        Ok(BertLmHead {
            word_embeddings,
            transform,
            hidden_act: self.hidden_act,
            layer_norm_eps: self.layer_norm_eps,
        })
    }
}

/// The head's own parameters; the decoder matrix is not among them.
#[derive(Module, Debug)]
pub struct LmTransform<B: Backend> {
    pub dense:      Linear<B>,
    pub layer_norm: LayerNorm<B>,
    pub bias:       Param<Tensor<B, 1>>,
}

#[derive(Debug)]
pub struct BertLmHead<'e, B: Backend> {
    word_embeddings: &'e Param<Tensor<B, 2>>,
    transform:       LmTransform<B>,
    hidden_act:      LmActivation,
    layer_norm_eps:  f64,
}

impl<'e, B: Backend> BertLmHead<'e, B> {
    /// Tie a new head to an encoder's token embedding layer.
    pub fn new(
        embeddings:  &'e Embedding<B>,
        hidden_size: usize,
        hidden_act:  LmActivation,
        device:      &B::Device,
    ) -> crate::Result<Self> {
        let [vocab_size, _] = embeddings.weight.val().dims();
        BertLmHeadConfig::new(hidden_size, vocab_size)
            .with_hidden_act(hidden_act)
            .init(&embeddings.weight, device)
    }

    /// The shared decoder matrix (the encoder's word embeddings).
    pub fn word_embeddings(&self) -> &'e Param<Tensor<B, 2>> {
        self.word_embeddings
    }

    pub fn vocab_size(&self) -> usize {
        self.word_embeddings.val().dims()[0]
    }

    pub fn hidden_size(&self) -> usize {
        self.word_embeddings.val().dims()[1]
    }

    /// Softmax confidence of the predicted token, per position.
    pub fn logits_to_probs(&self, logits: Tensor<B, 3>) -> crate::Result<Vec<Vec<f32>>> {
        let [batch_size, seq_len, _] = logits.dims();
        let probs = softmax(logits, 2).max_dim(2).reshape([batch_size, seq_len]);
        Ok(readback::rows(&readback::floats(probs)?, seq_len))
    }

    /// Writes the config only; the tied matrix belongs to the encoder.
    pub fn save(&self, dir: impl AsRef<Path>, index: usize) -> crate::Result<PathBuf> {
        tracing::warn!("The weights of BertLMHead are not saved");
        HeadStore::new(dir)?.save_config(&self.config(), index)
    }

    pub fn load(
        _weights_path: impl AsRef<Path>,
        _config_path:  impl AsRef<Path>,
        _device:       &B::Device,
    ) -> crate::Result<Self> {
        Err(HeadError::UnsupportedOperation(
            "BertLMHead does not support loading; tie a new head to the encoder's embeddings".into(),
        ))
    }

    /// Row-aligned (target id, predicted id) pairs for a batch.
    fn id_rows(&self, logits: Tensor<B, 3>, labels: &LmLabels<B>) -> crate::Result<(Vec<Vec<i64>>, Vec<Vec<i64>>)> {
        let [batch_size, seq_len, _] = logits.dims();
        let [label_batch, label_len] = labels.lm_label_ids.dims();
        ensure_aligned("lm label batch", batch_size, label_batch)?;
        ensure_aligned("lm label length", seq_len, label_len)?;

        let pred_ids = readback::ints(logits.argmax(2).reshape([batch_size, seq_len]))?;
        let label_ids = readback::ints(labels.lm_label_ids.clone())?;
        Ok((readback::rows(&label_ids, seq_len), readback::rows(&pred_ids, seq_len)))
    }
}

/// Map ids to tokens at masked positions; unmasked positions are skipped.
fn masked_tokens(label_ids: &[i64], ids: &[i64], label_map: &LabelMap) -> crate::Result<Vec<String>> {
    label_ids
        .iter()
        .zip(ids)
        .filter(|(&label, _)| label != LM_IGNORE_INDEX)
        .map(|(_, &id)| label_map.label(id).map(str::to_string))
        .collect()
}

impl<'e, B: Backend> PredictionHead<B> for BertLmHead<'e, B> {
    type Input    = Tensor<B, 3>;
    type Logits   = Tensor<B, 3>;
    type Labels   = LmLabels<B>;
    type Features = LmLabels<B>;
    type Preds    = Vec<Vec<String>>;

    fn kind(&self) -> HeadKind {
        HeadKind::BertLm
    }

    fn config(&self) -> HeadConfig {
        HeadConfig::BertLm(
            BertLmHeadConfig::new(self.hidden_size(), self.vocab_size())
                .with_hidden_act(self.hidden_act)
                .with_layer_norm_eps(self.layer_norm_eps),
        )
    }

    fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch_size, seq_len, hidden_size] = input.dims();

        let x = self.transform.dense.forward(input);
        let x = match self.hidden_act {
            LmActivation::Gelu => gelu(x),
            LmActivation::Relu => relu(x),
        };
        let x = self.transform.layer_norm.forward(x);

        // [batch * seq_len, hidden] · [hidden, vocab]
        let decoder = self.word_embeddings.val().transpose();
        let logits = x.reshape([batch_size * seq_len, hidden_size]).matmul(decoder)
            + self.transform.bias.val().unsqueeze::<2>();

        logits.reshape([batch_size, seq_len, self.vocab_size()])
    }

    /// One value per sample index. The flat batch-major position losses
    /// are viewed as [seq_len, batch_size] and averaged over the first
    /// axis, so value `j` is the mean of flat positions `j, j + batch_size,
    /// ...`. Unmasked positions count in the denominator.
    fn logits_to_loss(&self, logits: Tensor<B, 3>, labels: &LmLabels<B>) -> crate::Result<Tensor<B, 1>> {
        let [batch_size, seq_len, vocab_size] = logits.dims();
        let [label_batch, label_len] = labels.lm_label_ids.dims();
        ensure_aligned("lm label batch", batch_size, label_batch)?;
        ensure_aligned("lm label length", seq_len, label_len)?;

        let per_position = cross_entropy_per_sample(
            logits.reshape([batch_size * seq_len, vocab_size]),
            labels.lm_label_ids.clone().reshape([batch_size * seq_len]),
            None,
            Some(LM_IGNORE_INDEX),
        );

        Ok(per_position
            .reshape([seq_len, batch_size])
            .mean_dim(0)
            .reshape([batch_size]))
    }

    fn logits_to_preds(
        &self,
        logits:    Tensor<B, 3>,
        features:  &LmLabels<B>,
        label_map: &LabelMap,
    ) -> crate::Result<Vec<Vec<String>>> {
        let (label_rows, pred_rows) = self.id_rows(logits, features)?;
        label_rows
            .iter()
            .zip(&pred_rows)
            .map(|(labels, preds)| masked_tokens(labels, preds, label_map))
            .collect()
    }

    fn prepare_labels(&self, labels: &LmLabels<B>, label_map: &LabelMap) -> crate::Result<Vec<Vec<String>>> {
        let [_, seq_len] = labels.lm_label_ids.dims();
        let label_rows = readback::rows(&readback::ints(labels.lm_label_ids.clone())?, seq_len);
        label_rows
            .iter()
            .map(|labels| masked_tokens(labels, labels, label_map))
            .collect()
    }

    fn formatted_preds(
        &self,
        logits:    Tensor<B, 3>,
        features:  &LmLabels<B>,
        samples:   &[Sample],
        label_map: &LabelMap,
    ) -> crate::Result<FormattedPreds> {
        let probs = self.logits_to_probs(logits.clone())?;
        let (label_rows, pred_rows) = self.id_rows(logits, features)?;
        ensure_aligned("prediction contexts", pred_rows.len(), samples.len())?;

        let mut res = FormattedPreds::new(HeadKind::BertLm.task());
        for (((labels, preds), probs), sample) in label_rows.iter().zip(&pred_rows).zip(&probs).zip(samples) {
            for ((&label, &pred), &prob) in labels.iter().zip(preds).zip(probs) {
                if label == LM_IGNORE_INDEX {
                    continue;
                }
                res.predictions.push(PredictionRecord {
                    start:       None,
                    end:         None,
                    context:     sample.text().to_string(),
                    label:       label_map.label(pred)?.to_string(),
                    probability: Probability::Score(prob),
                });
            }
        }
        Ok(res)
    }
}
