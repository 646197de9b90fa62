// ============================================================
// Label Map
// ============================================================
// Bijection between integer label ids (the class axis of the
// logits) and string tags such as "B-PER" or "positive".
// For the masked LM head the "labels" are the vocabulary.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{HeadError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelMap {
    labels: Vec<String>,
    ids:    HashMap<String, usize>,
}

impl LabelMap {
    /// Build a map where the i-th label has id i.
    /// Duplicate labels would break the bijection and are rejected.
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let mut ids = HashMap::with_capacity(labels.len());
        for (id, label) in labels.iter().enumerate() {
            if ids.insert(label.clone(), id).is_some() {
                return Err(HeadError::InvalidConfig(format!("duplicate label '{label}'")));
            }
        }
        Ok(Self { labels, ids })
    }

    /// Tag for a label id.
    pub fn label(&self, id: i64) -> Result<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.labels.get(i))
            .map(String::as_str)
            .ok_or(HeadError::UnknownLabelId(id))
    }

    pub fn id(&self, label: &str) -> Option<usize> {
        self.ids.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl TryFrom<Vec<String>> for LabelMap {
    type Error = HeadError;

    fn try_from(labels: Vec<String>) -> Result<Self> {
        Self::new(labels)
    }
}

impl From<LabelMap> for Vec<String> {
    fn from(map: LabelMap) -> Self {
        map.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_both_directions() {
        let map = LabelMap::new(["O", "B-PER", "I-PER"]).unwrap();
        assert_eq!(map.label(1).unwrap(), "B-PER");
        assert_eq!(map.id("I-PER"), Some(2));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_out_of_range_ids_are_errors() {
        let map = LabelMap::new(["neg", "pos"]).unwrap();
        assert!(matches!(map.label(2), Err(HeadError::UnknownLabelId(2))));
        assert!(matches!(map.label(-100), Err(HeadError::UnknownLabelId(-100))));
    }

    #[test]
    fn test_duplicates_rejected() {
        assert!(LabelMap::new(["O", "O"]).is_err());
    }

    #[test]
    fn test_serde_as_plain_list() {
        let map = LabelMap::new(["neg", "pos"]).unwrap();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"["neg","pos"]"#);
        let back: LabelMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
