// ============================================================
// Token / Word / Char Alignment
// ============================================================
// The model sees subword tokens; callers want whole words and
// char offsets into the original text. These pure functions
// bridge the two.
//
//   initial_token_only  - keep only word-initial positions
//   word_spans          - rebuild one char span per word from
//                         token offsets
//   context_span        - map a packed [question, context]
//                         token index back into the context
//   join_answer         - glue context tokens back into text
//
// Example (WordPiece, continuation marker "##"):
//   tokens  ["Jo", "##hn", "Smith"]   offsets [0, 2, 8]
//   initial [true, false,  true   ]
//   words   [{0,4}, {8,13}]            ("John", "Smith")

use crate::domain::prediction::CharSpan;
use crate::domain::sample::TokenizedText;
use crate::error::{ensure_aligned, Result};

/// Prefix marking a subword that continues the previous token.
pub const CONTINUATION_MARKER: &str = "##";

/// Keep the elements of `seq` whose word-initial flag is set, in order.
///
/// Applied identically to predicted ids, confidences and ground truth
/// so all three stay word-aligned.
pub fn initial_token_only<T: Clone>(seq: &[T], initial_mask: &[bool]) -> Result<Vec<T>> {
    ensure_aligned("word-initial mask", seq.len(), initial_mask.len())?;
    Ok(seq
        .iter()
        .zip(initial_mask)
        .filter(|(_, &initial)| initial)
        .map(|(s, _)| s.clone())
        .collect())
}

/// Token text without continuation markers.
pub fn strip_continuation(token: &str) -> String {
    token.replace(CONTINUATION_MARKER, "")
}

/// One char span per source word.
///
/// A word-initial token closes the previous word and opens
/// `[offset, offset + len(token))`. A continuation token moves the
/// end of the open word to `offset + len(token without markers)`.
/// A leading continuation token (no word open yet) opens a word itself.
pub fn word_spans(tokenized: &TokenizedText) -> Vec<CharSpan> {
    let mut spans = Vec::new();
    let mut open: Option<CharSpan> = None;

    for (token, offset, start_of_word) in tokenized.iter() {
        if start_of_word {
            spans.extend(open.take());
            open = Some(CharSpan::new(offset, offset + token.chars().count()));
            continue;
        }
        let end = offset + strip_continuation(token).chars().count();
        match open.as_mut() {
            Some(span) => span.end = end,
            None => open = Some(CharSpan::new(offset, end)),
        }
    }
    spans.extend(open);
    spans
}

/// Index of the first context token in a packed sequence: the first
/// position whose segment id is nonzero, or 0 if there is none.
pub fn context_start(segment_ids: &[i64]) -> usize {
    segment_ids.iter().position(|&s| s > 0).unwrap_or(0)
}

/// Predicted answer indices moved into context-local token space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextSpan {
    pub start: usize,
    /// Inclusive end token.
    pub end: usize,
    /// `end + 1`, for slicing up to and including `end`.
    pub slice_end: usize,
}

/// Shift packed-sequence indices left by `shift`, clamping at zero.
pub fn context_span(start: usize, end: usize, shift: usize) -> ContextSpan {
    let end = end.saturating_sub(shift);
    ContextSpan {
        start: start.saturating_sub(shift),
        end,
        slice_end: end + 1,
    }
}

/// Join `tokens[start..end]` with spaces and drop continuation markers,
/// so `["New", "##ark"]` reads "Newark". Out-of-range bounds yield a
/// shorter (possibly empty) answer.
pub fn join_answer(tokens: &[String], start: usize, end: usize) -> String {
    let end = end.min(tokens.len());
    let start = start.min(end);
    tokens[start..end]
        .join(" ")
        .replace(" ##", "")
        .replace(CONTINUATION_MARKER, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenized(tokens: &[&str], offsets: &[usize], initial: &[bool]) -> TokenizedText {
        TokenizedText::new(
            tokens.iter().map(|t| t.to_string()).collect(),
            offsets.to_vec(),
            initial.to_vec(),
        )
        .unwrap()
    }

    #[test]
    fn test_initial_token_only_keeps_flagged_in_order() {
        let seq  = ['a', 'b', 'c', 'd', 'e'];
        let mask = [true, false, true, true, false];
        let out  = initial_token_only(&seq, &mask).unwrap();
        assert_eq!(out, vec!['a', 'c', 'd']);
        assert_eq!(out.len(), mask.iter().filter(|&&m| m).count());
    }

    #[test]
    fn test_initial_token_only_rejects_length_mismatch() {
        assert!(initial_token_only(&[1, 2, 3], &[true, false]).is_err());
    }

    #[test]
    fn test_word_spans_merge_subwords() {
        let tok = tokenized(&["Jo", "##hn", "Smith"], &[0, 2, 8], &[true, false, true]);
        assert_eq!(word_spans(&tok), vec![CharSpan::new(0, 4), CharSpan::new(8, 13)]);
    }

    #[test]
    fn test_word_spans_multiple_continuations() {
        // "unbelievable" -> un ##believ ##able
        let tok = tokenized(&["un", "##believ", "##able", "!"], &[0, 2, 8, 12], &[true, false, false, true]);
        assert_eq!(word_spans(&tok), vec![CharSpan::new(0, 12), CharSpan::new(12, 13)]);
    }

    #[test]
    fn test_word_spans_leading_continuation_opens_word() {
        let tok = tokenized(&["##ing", "now"], &[0, 4], &[false, true]);
        assert_eq!(word_spans(&tok), vec![CharSpan::new(0, 3), CharSpan::new(4, 7)]);
    }

    #[test]
    fn test_word_spans_empty() {
        assert!(word_spans(&TokenizedText::default()).is_empty());
    }

    #[test]
    fn test_context_span_shift() {
        let segments = [0, 0, 0, 1, 1, 1, 1];
        let shift = context_start(&segments);
        assert_eq!(shift, 3);
        let span = context_span(4, 5, shift);
        assert_eq!(span, ContextSpan { start: 1, end: 2, slice_end: 3 });
    }

    #[test]
    fn test_context_span_clamps_question_indices() {
        // prediction landed inside the question
        let span = context_span(1, 2, 3);
        assert_eq!(span, ContextSpan { start: 0, end: 0, slice_end: 1 });
    }

    #[test]
    fn test_context_start_without_context_segment() {
        assert_eq!(context_start(&[0, 0, 0]), 0);
    }

    #[test]
    fn test_join_answer_strips_markers() {
        let tokens: Vec<String> = ["in", "New", "##ark", "today"].iter().map(|s| s.to_string()).collect();
        assert_eq!(join_answer(&tokens, 1, 3), "Newark");
        assert_eq!(join_answer(&tokens, 1, 4), "Newark today");
        assert_eq!(join_answer(&tokens, 2, 99), "ark today");
        assert_eq!(join_answer(&tokens, 7, 9), "");
    }
}
