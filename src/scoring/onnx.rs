use super::errors::ScoringError;
use super::ProbabilityModel;

use log::info;
use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;
use std::path::Path;

/// Classifier exported to ONNX. Takes `N x 23` f32, returns `N x C` probabilities.
pub struct OnnxModel {
    // running a session needs exclusive access
    session: Mutex<Session>,
    output_name: String,
}

impl OnnxModel {
    pub fn load(path: &Path) -> Result<Self, ScoringError> {
        info!("Loading ONNX model from: {}", path.display());

        if !path.exists() {
            return Err(ScoringError::Artifact(format!(
                "model not found: {}",
                path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| ScoringError::Artifact(format!("session builder error: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ScoringError::Artifact(format!("optimization error: {}", e)))?
            .commit_from_file(path)
            .map_err(|e| ScoringError::Artifact(format!("unable to load model: {}", e)))?;

        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| ScoringError::Artifact("model defines no output".to_owned()))?;

        info!("ONNX model loaded, reading output {}", output_name);

        Ok(Self {
            session: Mutex::new(session),
            output_name,
        })
    }
}

impl ProbabilityModel for OnnxModel {
    fn predict_proba(&self, input: Array2<f32>) -> Result<Array2<f32>, ScoringError> {
        let rows = input.nrows();
        if rows == 0 {
            return Err(ScoringError::Shape("empty input matrix".to_owned()));
        }

        let tensor = Value::from_array(input)
            .map_err(|e| ScoringError::Model(format!("tensor error: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| ScoringError::Model(format!("inference failed: {}", e)))?;

        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| ScoringError::Model(format!("missing output {}", self.output_name)))?;
        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ScoringError::Model(format!("extract error: {}", e)))?;

        if data.is_empty() || data.len() % rows != 0 {
            return Err(ScoringError::Shape(format!(
                "{} output values for {} rows",
                data.len(),
                rows
            )));
        }

        Array2::from_shape_vec((rows, data.len() / rows), data.to_vec())
            .map_err(|e| ScoringError::Shape(e.to_string()))
    }
}
