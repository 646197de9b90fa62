// ============================================================
// Sample Domain Type
// ============================================================
// One input record as produced by the data-handling side:
// the untouched text (for slicing answers and entities back
// out) and its tokenised form.
//
// The tokenised form is three parallel arrays:
//
//   tokens        ["Jo", "##hn", "Smith"]
//   offsets       [0,    2,      8      ]   char offset of each token
//   start_of_word [true, false,  true   ]   first subword of a word?
//
// They must stay index-aligned, so TokenizedText can only be
// built through `new`, which rejects arrays of unequal length.

use crate::error::{ensure_aligned, HeadError, Result};

/// Original strings of a sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearText {
    /// The text the offsets point into (the context for QA samples).
    pub text: String,

    /// Question text; only QA samples carry one.
    pub question_text: Option<String>,
}

/// Tokens with their char offsets and word-initial flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenizedText {
    tokens:        Vec<String>,
    offsets:       Vec<usize>,
    start_of_word: Vec<bool>,
}

impl TokenizedText {
    pub fn new(
        tokens:        Vec<String>,
        offsets:       Vec<usize>,
        start_of_word: Vec<bool>,
    ) -> Result<Self> {
        ensure_aligned("token offsets", tokens.len(), offsets.len())?;
        ensure_aligned("word-initial flags", tokens.len(), start_of_word.len())?;
        Ok(Self { tokens, offsets, start_of_word })
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn start_of_word(&self) -> &[bool] {
        &self.start_of_word
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Iterate `(token, offset, start_of_word)` triples in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize, bool)> + '_ {
        self.tokens
            .iter()
            .zip(&self.offsets)
            .zip(&self.start_of_word)
            .map(|((t, &o), &w)| (t.as_str(), o, w))
    }
}

/// A single input with its original text and tokenisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub id:         String,
    pub clear_text: ClearText,
    pub tokenized:  TokenizedText,
}

impl Sample {
    pub fn new(id: impl Into<String>, text: impl Into<String>, tokenized: TokenizedText) -> Self {
        Self {
            id: id.into(),
            clear_text: ClearText { text: text.into(), question_text: None },
            tokenized,
        }
    }

    /// Attach the question of a QA sample.
    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.clear_text.question_text = Some(question.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.clear_text.text
    }

    pub fn question_text(&self) -> Result<&str> {
        self.clear_text
            .question_text
            .as_deref()
            .ok_or(HeadError::MissingField("question_text"))
    }
}
