// ============================================================
// Core Traits
// ============================================================
// The token classification head produces one tag per word and
// one char span per word. Turning those into entities ("B-PER"
// "I-PER" -> one PER span) is a policy that lives outside the
// head; the head only depends on this contract.
//
//   input:  tags and spans of equal length
//   output: merged tags and spans of equal length, no longer
//           than the input
//
// Implementations:
//   - IobSpanMerger (data::iob) -> begin/inside tagging scheme

use crate::domain::prediction::CharSpan;
use crate::error::Result;

/// Merged entity tags with their covering spans, index-aligned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedSpans {
    pub tags:  Vec<String>,
    pub spans: Vec<CharSpan>,
}

pub trait SpanMerger {
    /// Fuse adjacent word tags belonging to the same entity.
    /// Fails with `Misaligned` when `tags` and `spans` differ in length.
    fn merge(&self, tags: &[String], spans: &[CharSpan]) -> Result<MergedSpans>;
}
