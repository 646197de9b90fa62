// ============================================================
// prediction-heads
// ============================================================
// Task heads that sit on top of a shared encoder and turn its
// contextual embeddings into losses (training) and readable
// predictions (inference).
//
// Layers, leaves first:
//
//   domain/  - plain data: samples, label maps, prediction
//              records, and the span-merging contract
//   data/    - pure alignment functions (subword → word → char)
//              and the per-head label / feature batches
//   ml/      - all burn code: feed-forward block, losses,
//              the four heads, and the variant registry
//   infra/   - head persistence (weights + config per index)
//
// Reference: Devlin et al. (2019) BERT
//            Burn Book §3 (Building Blocks)

pub mod data;
pub mod domain;
pub mod error;
pub mod infra;
pub mod ml;

pub use error::{HeadError, Result};
pub use ml::head::PredictionHead;
pub use ml::registry::{AnyHead, HeadConfig, HeadKind, OutputType};
