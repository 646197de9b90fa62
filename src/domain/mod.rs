// ============================================================
// Domain Layer
// ============================================================
// Plain Rust structs and traits describing what the heads
// consume and produce. No burn types in here.
//
//   sample.rs     - a single input: original text plus its
//                   tokens, char offsets and word-initial flags
//   label_map.rs  - id <-> tag bijection supplied by the caller
//   prediction.rs - char spans and the records handed back to
//                   inference callers
//   traits.rs     - the tag/span merging contract used by the
//                   token classification head

pub mod label_map;
pub mod prediction;
pub mod sample;
pub mod traits;

pub use label_map::LabelMap;
pub use prediction::{CharSpan, FormattedPreds, PredictionRecord, Probability};
pub use sample::{ClearText, Sample, TokenizedText};
pub use traits::{MergedSpans, SpanMerger};
