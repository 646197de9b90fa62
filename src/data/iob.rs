// ============================================================
// IOB Span Merger
// ============================================================
// Default SpanMerger for begin/inside tagged predictions.
//
//   tags   ["B-PER", "I-PER", "O", "B-LOC"]
//   spans  [{0,4},   {5,10},  ..., {14,20}]
//   merged ["PER", "LOC"] with [{0,10}, {14,20}]
//
// Rules:
//   B-X            closes any open entity and opens an X
//   I-X (open X)   extends the open entity to this word
//   I-X otherwise  closes any open entity; the word is dropped
//   anything else  closes any open entity

use crate::domain::prediction::CharSpan;
use crate::domain::traits::{MergedSpans, SpanMerger};
use crate::error::{ensure_aligned, Result};

const BEGIN: &str = "B-";
const INSIDE: &str = "I-";

#[derive(Debug, Clone, Copy, Default)]
pub struct IobSpanMerger;

impl SpanMerger for IobSpanMerger {
    fn merge(&self, tags: &[String], spans: &[CharSpan]) -> Result<MergedSpans> {
        ensure_aligned("tag spans", tags.len(), spans.len())?;

        let mut merged = MergedSpans::default();
        let mut open: Option<(&str, CharSpan)> = None;

        for (tag, &span) in tags.iter().zip(spans) {
            if let Some(entity) = tag.strip_prefix(BEGIN) {
                close(&mut merged, open.take());
                open = Some((entity, span));
            } else if let Some(entity) = tag.strip_prefix(INSIDE) {
                match open {
                    Some((current, ref mut current_span)) if current == entity => {
                        current_span.end = span.end;
                    }
                    _ => close(&mut merged, open.take()),
                }
            } else {
                close(&mut merged, open.take());
            }
        }
        close(&mut merged, open);

        Ok(merged)
    }
}

fn close(merged: &mut MergedSpans, entity: Option<(&str, CharSpan)>) {
    if let Some((tag, span)) = entity {
        merged.tags.push(tag.to_string());
        merged.spans.push(span);
    }
}
