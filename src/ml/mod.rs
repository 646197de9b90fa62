// ============================================================
// ML Layer (Burn)
// ============================================================
// Everything that touches tensors lives here.
//
//   feed_forward.rs         - stack of linear layers shared by
//                             the classification and QA heads
//   loss.rs                 - per-sample cross entropy with
//                             class weights and an ignore index
//   head.rs                 - the PredictionHead contract
//   text_classification.rs  - one label per sequence
//   token_classification.rs - one tag per word, merged into spans
//   lm.rs                   - masked-token head tied to the
//                             encoder's embedding matrix
//   question_answering.rs   - start / end span extraction
//   registry.rs             - variant names, configs, factory,
//                             save / load
//
// Reference: Burn Book §3 (Building Blocks)
//            Devlin et al. (2019) BERT

pub mod feed_forward;
pub mod head;
pub mod lm;
pub mod loss;
pub mod question_answering;
pub mod registry;
pub mod text_classification;
pub mod token_classification;

pub(crate) mod readback;
