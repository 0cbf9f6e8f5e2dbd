use super::errors::ScoringError;

use serde::Deserialize;
use std::path::Path;

/// Index to label table of the trained classifier.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }

    pub fn load(path: &Path) -> Result<Self, ScoringError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ScoringError::Artifact(format!("{}: {}", path.display(), e)))?;
        let encoder: Self = serde_json::from_str(&raw)
            .map_err(|e| ScoringError::Artifact(format!("{}: {}", path.display(), e)))?;

        if encoder.classes.is_empty() {
            return Err(ScoringError::Artifact(format!(
                "{}: encoder has no classes",
                path.display()
            )));
        }
        Ok(encoder)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn inverse_transform(&self, idx: usize) -> Result<&str, ScoringError> {
        self.classes
            .get(idx)
            .map(String::as_str)
            .ok_or(ScoringError::UnknownClass(idx))
    }
}
