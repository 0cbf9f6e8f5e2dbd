use super::errors::ScoringError;
use crate::features::{FeatureVector, FEATURE_COUNT};

use ndarray::Array2;
use serde::Deserialize;
use std::path::Path;

/// Per feature standardisation fitted at training time: `(x - mean) / scale`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ScoringError> {
        let scaler = Self { mean, scale };
        scaler.validate()?;
        Ok(scaler)
    }

    pub fn load(path: &Path) -> Result<Self, ScoringError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ScoringError::Artifact(format!("{}: {}", path.display(), e)))?;
        let scaler: Self = serde_json::from_str(&raw)
            .map_err(|e| ScoringError::Artifact(format!("{}: {}", path.display(), e)))?;
        scaler.validate()?;
        Ok(scaler)
    }

    fn validate(&self) -> Result<(), ScoringError> {
        if self.mean.len() != FEATURE_COUNT || self.scale.len() != FEATURE_COUNT {
            return Err(ScoringError::Shape(format!(
                "scaler fitted on {}/{} features, expected {}",
                self.mean.len(),
                self.scale.len(),
                FEATURE_COUNT
            )));
        }
        Ok(())
    }

    /// Scaled N x 23 matrix, rows in the order of `features`.
    pub fn transform(&self, features: &[FeatureVector]) -> Array2<f32> {
        Array2::from_shape_fn((features.len(), FEATURE_COUNT), |(row, col)| {
            // constant features were fitted with a zero scale
            let scale = if self.scale[col] == 0.0 { 1.0 } else { self.scale[col] };
            ((features[row].get(col) - self.mean[col]) / scale) as f32
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_transform_standardises_columns() {
        let mut mean = vec![0.0; FEATURE_COUNT];
        let mut scale = vec![1.0; FEATURE_COUNT];
        mean[1] = 100.0;
        scale[1] = 50.0;
        scale[2] = 0.0;
        let scaler = StandardScaler::new(mean, scale).unwrap();

        let mut raw = [0.0; FEATURE_COUNT];
        raw[0] = 6.0;
        raw[1] = 200.0;
        raw[2] = 3.0;
        let matrix = scaler.transform(&[FeatureVector::from(raw)]);

        assert_eq!(matrix.shape(), &[1, FEATURE_COUNT]);
        assert_eq!(matrix[[0, 0]], 6.0);
        assert_eq!(matrix[[0, 1]], 2.0);
        assert_eq!(matrix[[0, 2]], 3.0);
    }

    #[test]
    fn test_rejects_wrong_width() {
        assert!(matches!(
            StandardScaler::new(vec![0.0; 3], vec![1.0; 3]),
            Err(ScoringError::Shape(_))
        ));
    }

    #[test]
    fn test_load_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let body = serde_json::json!({
            "mean": vec![1.0; FEATURE_COUNT],
            "scale": vec![2.0; FEATURE_COUNT],
        });
        file.write_all(body.to_string().as_bytes()).unwrap();

        let scaler = StandardScaler::load(file.path()).unwrap();
        let matrix = scaler.transform(&[FeatureVector::from([5.0; FEATURE_COUNT])]);
        assert!(matrix.iter().all(|&v| v == 2.0));
    }
}
