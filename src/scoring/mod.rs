pub mod encoder;
pub mod errors;
pub mod onnx;
pub mod scaler;

pub use encoder::LabelEncoder;
pub use errors::ScoringError;
pub use onnx::OnnxModel;
pub use scaler::StandardScaler;

use crate::features::{FeatureVector, FEATURE_COUNT};
use crate::settings::ModelSettings;

use log::debug;
use ndarray::{Array2, ArrayView1};

/// Trained multi-class model, scaled features in, class probabilities out.
#[cfg_attr(test, mockall::automock)]
pub trait ProbabilityModel: Send + Sync {
    fn predict_proba(&self, input: Array2<f32>) -> Result<Array2<f32>, ScoringError>;
}

/// Turns the feature vectors of a file into one label per flow.
#[cfg_attr(test, mockall::automock)]
pub trait Score: Send + Sync {
    fn score(&self, features: &[FeatureVector]) -> Result<Vec<String>, ScoringError>;
}

/// Scaler, model and encoder, loaded once and shared read only by every worker.
pub struct ScoringAdapter {
    scaler: StandardScaler,
    model: Box<dyn ProbabilityModel>,
    encoder: LabelEncoder,
}

impl ScoringAdapter {
    pub fn new(
        scaler: StandardScaler,
        model: Box<dyn ProbabilityModel>,
        encoder: LabelEncoder,
    ) -> Self {
        Self {
            scaler,
            model,
            encoder,
        }
    }

    pub fn load(settings: &ModelSettings) -> Result<Self, ScoringError> {
        let scaler = StandardScaler::load(&settings.scaler_path)?;
        let encoder = LabelEncoder::load(&settings.encoder_path)?;
        let model = OnnxModel::load(&settings.model_path)?;

        Ok(Self::new(scaler, Box::new(model), encoder))
    }
}

/// First maximum wins, NaN never does.
fn argmax(row: ArrayView1<f32>) -> usize {
    let mut best = 0;
    for (idx, &p) in row.iter().enumerate() {
        if p > row[best] || (row[best].is_nan() && !p.is_nan()) {
            best = idx;
        }
    }
    best
}

impl Score for ScoringAdapter {
    fn score(&self, features: &[FeatureVector]) -> Result<Vec<String>, ScoringError> {
        if features.is_empty() {
            return Ok(Vec::new());
        }

        let input = self.scaler.transform(features);
        debug_assert_eq!(input.ncols(), FEATURE_COUNT);

        let probabilities = self.model.predict_proba(input)?;
        if probabilities.nrows() != features.len() {
            return Err(ScoringError::Shape(format!(
                "model returned {} rows for {} flows",
                probabilities.nrows(),
                features.len()
            )));
        }
        if probabilities.ncols() != self.encoder.len() {
            debug!(
                "model emits {} classes, encoder knows {}",
                probabilities.ncols(),
                self.encoder.len()
            );
        }

        probabilities
            .rows()
            .into_iter()
            .map(|row| {
                self.encoder
                    .inverse_transform(argmax(row))
                    .map(str::to_owned)
            })
            .collect()
    }
}
