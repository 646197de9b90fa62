// ============================================================
// Error Types
// ============================================================
// Every fallible operation in the library returns HeadError.
// The binary wraps these in anyhow at the CLI boundary.
//
// Two groups of errors:
//   - lifecycle errors (unknown variant, unsupported reload,
//     bad config, recorder / file failures)
//   - structural errors (misaligned batches, unknown label ids)
//     which abort the operation instead of truncating output

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeadError {
    /// Factory or loader was given a variant name that is not registered.
    #[error("unknown prediction head type '{0}'")]
    UnknownHeadType(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Parallel sequences that must be index-aligned have different lengths.
    #[error("misaligned {what}: expected {expected}, found {found}")]
    Misaligned {
        what:     &'static str,
        expected: usize,
        found:    usize,
    },

    #[error("label id {0} is not in the label map")]
    UnknownLabelId(i64),

    #[error("invalid head config: {0}")]
    InvalidConfig(String),

    #[error("sample is missing '{0}'")]
    MissingField(&'static str),

    #[error("cannot read tensor data: {0}")]
    Tensor(String),

    #[error("weight recorder failed: {0}")]
    Record(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HeadError>;

/// Fail with `Misaligned` unless `found == expected`.
pub(crate) fn ensure_aligned(what: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(HeadError::Misaligned { what, expected, found })
    }
}
