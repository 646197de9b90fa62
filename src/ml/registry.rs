// ============================================================
// Head Registry
// ============================================================
// The closed set of head variants, addressed by name:
//
//   "TextClassificationHead"   per_sequence
//   "TokenClassificationHead"  per_token
//   "BertLMHead"               per_token
//   "QuestionAnsweringHead"    per_token_squad
//
// HeadKind   - the variant tag (name, output type, task name)
// HeadConfig - a variant's persisted architecture, tagged by
//              "name" in JSON
// AnyHead    - a constructed feed-forward head of any variant,
//              as returned by the factory and the loader
//
// BertLMHead is registered but cannot come out of the factory
// or the loader: it needs a live encoder's embeddings to tie to.
// Build it with BertLmHead::new instead.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{HeadError, Result};
use crate::infra::head_store::{self, HeadStore};
use crate::ml::head::PredictionHead;
use crate::ml::lm::BertLmHeadConfig;
use crate::ml::question_answering::{QuestionAnsweringHead, QuestionAnsweringHeadConfig};
use crate::ml::text_classification::{TextClassificationHead, TextClassificationHeadConfig};
use crate::ml::token_classification::{TokenClassificationHead, TokenClassificationHeadConfig};

/// Granularity of a head's predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    PerSequence,
    PerToken,
    PerTokenSquad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeadKind {
    TextClassification,
    TokenClassification,
    BertLm,
    QuestionAnswering,
}

impl HeadKind {
    pub const ALL: [HeadKind; 4] = [
        HeadKind::TextClassification,
        HeadKind::TokenClassification,
        HeadKind::BertLm,
        HeadKind::QuestionAnswering,
    ];

    /// Registered name, as used by the factory and in saved configs.
    pub fn name(self) -> &'static str {
        match self {
            HeadKind::TextClassification  => "TextClassificationHead",
            HeadKind::TokenClassification => "TokenClassificationHead",
            HeadKind::BertLm              => "BertLMHead",
            HeadKind::QuestionAnswering   => "QuestionAnsweringHead",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| HeadError::UnknownHeadType(name.to_string()))
    }

    pub fn output_type(self) -> OutputType {
        match self {
            HeadKind::TextClassification => OutputType::PerSequence,
            HeadKind::TokenClassification | HeadKind::BertLm => OutputType::PerToken,
            HeadKind::QuestionAnswering => OutputType::PerTokenSquad,
        }
    }

    /// Task name stamped on formatted predictions.
    pub fn task(self) -> &'static str {
        match self {
            HeadKind::TextClassification  => "text_classification",
            HeadKind::TokenClassification => "ner",
            HeadKind::BertLm              => "lm",
            HeadKind::QuestionAnswering   => "qa",
        }
    }

    /// A config may not claim an output type its variant does not produce.
    pub fn check_output_type(self, found: OutputType) -> Result<()> {
        if found == self.output_type() {
            Ok(())
        } else {
            Err(HeadError::InvalidConfig(format!(
                "{} produces {:?} output, config says {:?}",
                self.name(),
                self.output_type(),
                found
            )))
        }
    }
}

impl fmt::Display for HeadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HeadKind {
    type Err = HeadError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

/// Persisted architecture of one head, discriminated by "name".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum HeadConfig {
    #[serde(rename = "TextClassificationHead")]
    TextClassification(TextClassificationHeadConfig),
    #[serde(rename = "TokenClassificationHead")]
    TokenClassification(TokenClassificationHeadConfig),
    #[serde(rename = "BertLMHead")]
    BertLm(BertLmHeadConfig),
    #[serde(rename = "QuestionAnsweringHead")]
    QuestionAnswering(QuestionAnsweringHeadConfig),
}

impl HeadConfig {
    pub fn kind(&self) -> HeadKind {
        match self {
            HeadConfig::TextClassification(_)  => HeadKind::TextClassification,
            HeadConfig::TokenClassification(_) => HeadKind::TokenClassification,
            HeadConfig::BertLm(_)              => HeadKind::BertLm,
            HeadConfig::QuestionAnswering(_)   => HeadKind::QuestionAnswering,
        }
    }

    pub fn output_type(&self) -> OutputType {
        match self {
            HeadConfig::TextClassification(c)  => c.ph_output_type,
            HeadConfig::TokenClassification(c) => c.ph_output_type,
            HeadConfig::BertLm(c)              => c.ph_output_type,
            HeadConfig::QuestionAnswering(c)   => c.ph_output_type,
        }
    }

    /// Layer sizes of the feed-forward block; the LM head reports
    /// its transform as [hidden_size, vocab_size].
    pub fn layer_dims(&self) -> Vec<usize> {
        match self {
            HeadConfig::TextClassification(c)  => c.layer_dims.clone(),
            HeadConfig::TokenClassification(c) => c.layer_dims.clone(),
            HeadConfig::BertLm(c)              => vec![c.hidden_size, c.vocab_size],
            HeadConfig::QuestionAnswering(c)   => c.layer_dims.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a saved config. An unregistered "name" is reported as
    /// `UnknownHeadType` rather than a generic parse failure.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let name = value
            .get("name")
            .and_then(serde_json::Value::as_str)
            .ok_or(HeadError::MissingField("name"))?;
        HeadKind::from_name(name)?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Any head the factory or loader can build.
#[derive(Debug)]
pub enum AnyHead<B: Backend> {
    TextClassification(TextClassificationHead<B>),
    TokenClassification(TokenClassificationHead<B>),
    QuestionAnswering(QuestionAnsweringHead<B>),
}

impl<B: Backend> AnyHead<B> {
    /// Factory: build a fresh head by registered name.
    ///
    /// `class_weights` only applies to the text classification head.
    pub fn create(
        name:          &str,
        layer_dims:    Vec<usize>,
        class_weights: Option<Vec<f32>>,
        device:        &B::Device,
    ) -> Result<Self> {
        let kind = HeadKind::from_name(name)?;
        if class_weights.is_some() && kind != HeadKind::TextClassification {
            tracing::warn!("{kind} ignores class weights");
        }

        let config = match kind {
            HeadKind::TextClassification => HeadConfig::TextClassification(
                TextClassificationHeadConfig::new(layer_dims).with_class_weights(class_weights),
            ),
            HeadKind::TokenClassification => {
                HeadConfig::TokenClassification(TokenClassificationHeadConfig::new(layer_dims))
            }
            HeadKind::QuestionAnswering => {
                HeadConfig::QuestionAnswering(QuestionAnsweringHeadConfig::new(layer_dims))
            }
            HeadKind::BertLm => {
                return Err(HeadError::UnsupportedOperation(
                    "BertLMHead needs the encoder's word embeddings; build it with BertLmHead::new".into(),
                ))
            }
        };
        Self::from_config(&config, device)
    }

    pub fn from_config(config: &HeadConfig, device: &B::Device) -> Result<Self> {
        let head = match config {
            HeadConfig::TextClassification(c)  => AnyHead::TextClassification(c.init(device)?),
            HeadConfig::TokenClassification(c) => AnyHead::TokenClassification(c.init(device)?),
            HeadConfig::QuestionAnswering(c)   => AnyHead::QuestionAnswering(c.init(device)?),
            HeadConfig::BertLm(_) => {
                return Err(HeadError::UnsupportedOperation(
                    "BertLMHead cannot be rebuilt from its config alone".into(),
                ))
            }
        };
        tracing::info!("Prepared a {} with layer dims {:?}", head.kind(), config.layer_dims());
        Ok(head)
    }

    pub fn kind(&self) -> HeadKind {
        match self {
            AnyHead::TextClassification(h)  => h.kind(),
            AnyHead::TokenClassification(h) => h.kind(),
            AnyHead::QuestionAnswering(h)   => h.kind(),
        }
    }

    pub fn config(&self) -> HeadConfig {
        match self {
            AnyHead::TextClassification(h)  => h.config(),
            AnyHead::TokenClassification(h) => h.config(),
            AnyHead::QuestionAnswering(h)   => h.config(),
        }
    }

    /// Write `prediction_head_{index}.mpk.gz` and its config into `dir`.
    /// Returns (weights path, config path).
    pub fn save(&self, dir: impl AsRef<Path>, index: usize) -> Result<(PathBuf, PathBuf)> {
        let store = HeadStore::new(dir)?;
        let weights = match self {
            AnyHead::TextClassification(h)  => store.save_weights::<B, _>(h.clone(), index)?,
            AnyHead::TokenClassification(h) => store.save_weights::<B, _>(h.clone(), index)?,
            AnyHead::QuestionAnswering(h)   => store.save_weights::<B, _>(h.clone(), index)?,
        };
        let config = store.save_config(&self.config(), index)?;
        Ok((weights, config))
    }

    /// Rebuild a head from its config file, then restore its weights.
    /// `weights_path` may be given with or without the `.mpk.gz` suffix.
    pub fn load(
        weights_path: impl AsRef<Path>,
        config_path:  impl AsRef<Path>,
        device:       &B::Device,
    ) -> Result<Self> {
        let config = head_store::load_config(config_path)?;
        if config.kind() == HeadKind::BertLm {
            return Err(HeadError::UnsupportedOperation(
                "BertLMHead does not support loading; tie a new head to the encoder's embeddings".into(),
            ));
        }

        let weights_path = weights_path.as_ref();
        let head = match Self::from_config(&config, device)? {
            AnyHead::TextClassification(h) => {
                AnyHead::TextClassification(head_store::load_weights::<B, _>(h, weights_path, device)?)
            }
            AnyHead::TokenClassification(h) => {
                AnyHead::TokenClassification(head_store::load_weights::<B, _>(h, weights_path, device)?)
            }
            AnyHead::QuestionAnswering(h) => {
                AnyHead::QuestionAnswering(head_store::load_weights::<B, _>(h, weights_path, device)?)
            }
        };
        tracing::info!("Loaded {} weights from '{}'", head.kind(), weights_path.display());
        Ok(head)
    }

    pub fn as_text_classification(&self) -> Option<&TextClassificationHead<B>> {
        match self {
            AnyHead::TextClassification(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_token_classification(&self) -> Option<&TokenClassificationHead<B>> {
        match self {
            AnyHead::TokenClassification(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_question_answering(&self) -> Option<&QuestionAnsweringHead<B>> {
        match self {
            AnyHead::QuestionAnswering(h) => Some(h),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    #[test]
    fn test_names_round_trip() {
        for kind in HeadKind::ALL {
            assert_eq!(HeadKind::from_name(kind.name()).unwrap(), kind);
            assert_eq!(kind.to_string().parse::<HeadKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_name() {
        let err = HeadKind::from_name("FancyHead").unwrap_err();
        assert!(matches!(err, HeadError::UnknownHeadType(name) if name == "FancyHead"));
    }

    #[test]
    fn test_output_types() {
        assert_eq!(HeadKind::TextClassification.output_type(), OutputType::PerSequence);
        assert_eq!(HeadKind::TokenClassification.output_type(), OutputType::PerToken);
        assert_eq!(HeadKind::BertLm.output_type(), OutputType::PerToken);
        assert_eq!(HeadKind::QuestionAnswering.output_type(), OutputType::PerTokenSquad);
    }

    #[test]
    fn test_config_json_carries_name_and_output_type() {
        let config = HeadConfig::TextClassification(
            TextClassificationHeadConfig::new(vec![8, 3]).with_class_weights(Some(vec![1.0, 2.0, 0.5])),
        );
        let json = config.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["name"], "TextClassificationHead");
        assert_eq!(value["ph_output_type"], "per_sequence");

        let back = HeadConfig::from_json(&json).unwrap();
        assert_eq!(back.kind(), HeadKind::TextClassification);
        assert_eq!(back.layer_dims(), vec![8, 3]);
        match back {
            HeadConfig::TextClassification(c) => assert_eq!(c.class_weights, Some(vec![1.0, 2.0, 0.5])),
            other => panic!("unexpected config {other:?}"),
        }
    }

    #[test]
    fn test_config_with_unregistered_name() {
        let err = HeadConfig::from_json(r#"{"name": "FancyHead", "layer_dims": [4, 2]}"#).unwrap_err();
        assert!(matches!(err, HeadError::UnknownHeadType(_)));

        let err = HeadConfig::from_json(r#"{"layer_dims": [4, 2]}"#).unwrap_err();
        assert!(matches!(err, HeadError::MissingField("name")));
    }

    #[test]
    fn test_factory_builds_each_feed_forward_variant() {
        let device = Default::default();
        let text = AnyHead::<TB>::create("TextClassificationHead", vec![4, 3], None, &device).unwrap();
        assert_eq!(text.kind(), HeadKind::TextClassification);
        assert_eq!(text.as_text_classification().map(|h| h.num_labels()), Some(3));

        let ner = AnyHead::<TB>::create("TokenClassificationHead", vec![4, 5], None, &device).unwrap();
        assert_eq!(ner.config().output_type(), OutputType::PerToken);
        assert!(ner.as_text_classification().is_none());

        let qa = AnyHead::<TB>::create("QuestionAnsweringHead", vec![4, 2], None, &device).unwrap();
        assert!(qa.as_question_answering().is_some());
    }

    #[test]
    fn test_factory_rejects_lm_and_unknown_names() {
        let device = Default::default();
        let err = AnyHead::<TB>::create("BertLMHead", vec![4, 10], None, &device).unwrap_err();
        assert!(matches!(err, HeadError::UnsupportedOperation(_)));

        let err = AnyHead::<TB>::create("NotAHead", vec![4, 2], None, &device).unwrap_err();
        assert!(matches!(err, HeadError::UnknownHeadType(_)));
    }

    #[test]
    fn test_config_rebuilds_same_architecture() {
        let device = Default::default();
        let head = AnyHead::<TB>::create("TokenClassificationHead", vec![6, 4, 9], None, &device).unwrap();
        let rebuilt = AnyHead::<TB>::from_config(&head.config(), &device).unwrap();
        assert_eq!(rebuilt.kind(), head.kind());
        assert_eq!(rebuilt.config().layer_dims(), vec![6, 4, 9]);
    }

    #[test]
    fn test_mismatched_output_type_rejected() {
        let config = TokenClassificationHeadConfig::new(vec![4, 2]).with_ph_output_type(OutputType::PerSequence);
        let err = AnyHead::<TB>::from_config(&HeadConfig::TokenClassification(config), &Default::default())
            .unwrap_err();
        assert!(matches!(err, HeadError::InvalidConfig(_)));
    }
}
