use burn::{backend::NdArray, nn::EmbeddingConfig, prelude::*};

use prediction_heads::ml::lm::{BertLmHead, LmActivation};
use prediction_heads::{AnyHead, HeadConfig, HeadError, HeadKind, OutputType, PredictionHead};

type TB = NdArray;

fn floats<const D: usize>(tensor: Tensor<TB, D>) -> Vec<f32> {
    tensor.into_data().to_vec::<f32>().unwrap()
}

fn pooled() -> Tensor<TB, 2> {
    Tensor::from_floats([[0.1, -0.4, 0.9, 0.3], [1.5, 0.0, -0.2, 0.7]], &Default::default())
}

fn sequence() -> Tensor<TB, 3> {
    let flat: Vec<f32> = (0..24).map(|i| (i as f32 * 0.37).sin()).collect();
    Tensor::<TB, 1>::from_floats(flat.as_slice(), &Default::default()).reshape([2, 3, 4])
}

#[test]
fn test_text_head_reload_reproduces_outputs() {
    let device = Default::default();
    let dir = tempfile::tempdir().unwrap();

    let head = AnyHead::<TB>::create("TextClassificationHead", vec![4, 3], Some(vec![1.0, 2.0, 1.0]), &device)
        .unwrap();
    let (weights, config) = head.save(dir.path(), 0).unwrap();
    assert_eq!(weights, dir.path().join("prediction_head_0.mpk.gz"));
    assert_eq!(config, dir.path().join("prediction_head_0_config.json"));
    assert!(weights.is_file());

    let loaded = AnyHead::<TB>::load(&weights, &config, &device).unwrap();
    let (before, after) = match (&head, &loaded) {
        (AnyHead::TextClassification(a), AnyHead::TextClassification(b)) => {
            (floats(a.forward(pooled())), floats(b.forward(pooled())))
        }
        other => panic!("unexpected variants {other:?}"),
    };
    assert_eq!(before, after);

    match loaded.config() {
        HeadConfig::TextClassification(c) => assert_eq!(c.class_weights, Some(vec![1.0, 2.0, 1.0])),
        other => panic!("unexpected config {other:?}"),
    }
}

#[test]
fn test_token_head_reload_accepts_path_without_suffix() {
    let device = Default::default();
    let dir = tempfile::tempdir().unwrap();

    let head = AnyHead::<TB>::create("TokenClassificationHead", vec![4, 6, 5], None, &device).unwrap();
    let (_, config) = head.save(dir.path(), 3).unwrap();

    let loaded = AnyHead::<TB>::load(dir.path().join("prediction_head_3"), &config, &device).unwrap();
    assert_eq!(loaded.kind(), HeadKind::TokenClassification);

    let before = floats(head.as_token_classification().unwrap().forward(sequence()));
    let after = floats(loaded.as_token_classification().unwrap().forward(sequence()));
    assert_eq!(before, after);
}

#[test]
fn test_qa_head_reload_reproduces_span_logits() {
    let device = Default::default();
    let dir = tempfile::tempdir().unwrap();

    let head = AnyHead::<TB>::create("QuestionAnsweringHead", vec![4, 2], None, &device).unwrap();
    let (weights, config) = head.save(dir.path(), 1).unwrap();
    let loaded = AnyHead::<TB>::load(&weights, &config, &device).unwrap();

    let a = head.as_question_answering().unwrap().forward(sequence());
    let b = loaded.as_question_answering().unwrap().forward(sequence());
    assert_eq!(floats(a.start_logits), floats(b.start_logits));
    assert_eq!(floats(a.end_logits), floats(b.end_logits));
}

#[test]
fn test_saved_config_rebuilds_architecture() {
    let device = Default::default();
    let dir = tempfile::tempdir().unwrap();

    let head = AnyHead::<TB>::create("TokenClassificationHead", vec![4, 9], None, &device).unwrap();
    let (_, config_path) = head.save(dir.path(), 0).unwrap();

    let json = std::fs::read_to_string(&config_path).unwrap();
    let config = HeadConfig::from_json(&json).unwrap();
    assert_eq!(config.kind(), HeadKind::TokenClassification);
    assert_eq!(config.output_type(), OutputType::PerToken);

    let rebuilt = AnyHead::<TB>::from_config(&config, &device).unwrap();
    assert_eq!(rebuilt.config().layer_dims(), vec![4, 9]);
}

#[test]
fn test_lm_head_saves_config_only_and_cannot_be_loaded() {
    let device = Default::default();
    let dir = tempfile::tempdir().unwrap();
    let embeddings = EmbeddingConfig::new(10, 4).init::<TB>(&device);

    let head = BertLmHead::new(&embeddings, 4, LmActivation::Gelu, &device).unwrap();
    let config_path = head.save(dir.path(), 0).unwrap();
    assert!(config_path.is_file());
    assert!(!dir.path().join("prediction_head_0.mpk.gz").exists());

    let config = HeadConfig::from_json(&std::fs::read_to_string(&config_path).unwrap()).unwrap();
    assert_eq!(config.kind(), HeadKind::BertLm);
    assert_eq!(config.layer_dims(), vec![4, 10]);

    let err = AnyHead::<TB>::load(dir.path().join("prediction_head_0"), &config_path, &device).unwrap_err();
    assert!(matches!(err, HeadError::UnsupportedOperation(_)));
}

#[test]
fn test_unknown_variant_name_in_factory_and_config() {
    let device = Default::default();
    let err = AnyHead::<TB>::create("RegressionHead", vec![4, 1], None, &device).unwrap_err();
    assert!(matches!(err, HeadError::UnknownHeadType(_)));

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("prediction_head_0_config.json");
    std::fs::write(&config_path, r#"{"name": "RegressionHead", "layer_dims": [4, 1]}"#).unwrap();
    let err = AnyHead::<TB>::load(dir.path().join("prediction_head_0"), &config_path, &device).unwrap_err();
    assert!(matches!(err, HeadError::UnknownHeadType(_)));
}
