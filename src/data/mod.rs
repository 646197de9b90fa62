// ============================================================
// Data Layer
// ============================================================
// Pure, framework-light helpers between the model's token
// space and the caller's text space:
//
//   alignment.rs - word-initial filtering, word span rebuild,
//                  QA index shifting and answer joining
//   iob.rs       - default begin/inside span merging policy
//   batch.rs     - per-head label and feature tensors
//
// alignment.rs and iob.rs never touch burn, so they can be
// tested without any backend.

pub mod alignment;
pub mod batch;
pub mod iob;

pub use batch::{LmLabels, SequenceLabels, SpanFeatures, SpanLabels, TokenFeatures, TokenLabels};
pub use iob::IobSpanMerger;
