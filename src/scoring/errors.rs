use std::fmt;

#[derive(Debug)]
pub enum ScoringError {
    Artifact(String),
    Shape(String),
    Model(String),
    UnknownClass(usize),
}

impl fmt::Display for ScoringError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Artifact(e) => write!(f, "unable to load model artifact: {}", e),
            Self::Shape(e) => write!(f, "unexpected shape: {}", e),
            Self::Model(e) => write!(f, "model failure: {}", e),
            Self::UnknownClass(idx) => {
                write!(f, "class index {} missing from the label encoder", idx)
            }
        }
    }
}

impl std::error::Error for ScoringError {}
