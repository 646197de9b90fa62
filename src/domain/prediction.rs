// ============================================================
// Prediction Records
// ============================================================
// What inference callers get back from `formatted_preds`:
//
//   { "task": "ner",
//     "predictions": [
//        { "start": 0, "end": 10, "context": "John Smith",
//          "label": "PER", "probability": 0.97 } ] }
//
// Sequence-level predictions have no span, so start/end are
// optional. QA has no computed confidence yet, so probability
// can be explicitly unavailable.

use serde::{Deserialize, Serialize};

/// Half-open char range `[start, end)` into the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharSpan {
    pub start: usize,
    pub end:   usize,
}

impl CharSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The chars of `text` covered by this span. Bounds past the end
    /// of the text are clipped rather than rejected.
    pub fn slice(&self, text: &str) -> String {
        text.chars()
            .skip(self.start)
            .take(self.end.saturating_sub(self.start))
            .collect()
    }
}

/// Confidence attached to a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Probability {
    Score(f32),
    /// Not computed for this head; serialised as `null`.
    Unavailable,
}

impl Probability {
    pub fn score(&self) -> Option<f32> {
        match self {
            Probability::Score(p) => Some(*p),
            Probability::Unavailable => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub start:       Option<usize>,
    pub end:         Option<usize>,
    pub context:     String,
    pub label:       String,
    pub probability: Probability,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedPreds {
    pub task:        String,
    pub predictions: Vec<PredictionRecord>,
}

impl FormattedPreds {
    pub fn new(task: impl Into<String>) -> Self {
        Self { task: task.into(), predictions: Vec::new() }
    }
}
