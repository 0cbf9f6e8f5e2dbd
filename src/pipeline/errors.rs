use crate::flows::CaptureError;
use crate::scoring::ScoringError;
use crate::storage::StorageError;

use std::fmt;
use std::path::PathBuf;

/// Failure of a single capture file. Never stops the pool.
#[derive(Debug)]
pub enum ProcessingError {
    Read(CaptureError),
    Scoring(ScoringError),
    Storage(StorageError),
    Panicked(String),
}

impl ProcessingError {
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Read(_) => "read",
            Self::Scoring(_) => "score",
            Self::Storage(_) => "persist",
            Self::Panicked(_) => "worker",
        }
    }
}

impl From<CaptureError> for ProcessingError {
    fn from(e: CaptureError) -> Self {
        Self::Read(e)
    }
}

impl From<ScoringError> for ProcessingError {
    fn from(e: ScoringError) -> Self {
        Self::Scoring(e)
    }
}

impl From<StorageError> for ProcessingError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Read(e) => write!(f, "{}", e),
            Self::Scoring(e) => write!(f, "{}", e),
            Self::Storage(e) => write!(f, "{}", e),
            Self::Panicked(e) => write!(f, "worker panicked: {}", e),
        }
    }
}

impl std::error::Error for ProcessingError {}

#[derive(Debug)]
pub enum PipelineError {
    WatchDirMissing(PathBuf),
    Watch(notify::Error),
}

impl From<notify::Error> for PipelineError {
    fn from(e: notify::Error) -> Self {
        Self::Watch(e)
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::WatchDirMissing(dir) => {
                write!(f, "watch directory {} does not exist", dir.display())
            }
            Self::Watch(e) => write!(f, "unable to watch capture directory: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}
