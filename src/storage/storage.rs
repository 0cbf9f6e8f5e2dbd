use crate::aggregation::PredictionRecord;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

#[derive(Debug)]
pub enum StorageError {
    Connection(String),
    Timeout(Duration),
    Insert(String),
    RetriesExhausted {
        attempts: usize,
        last: Box<StorageError>,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "unable to get a database handle: {}", e),
            Self::Timeout(after) => write!(f, "database handle not ready after {:?}", after),
            Self::Insert(e) => write!(f, "unable to insert prediction: {}", e),
            Self::RetriesExhausted { attempts, last } => {
                write!(f, "gave up after {} attempts: {}", attempts, last)
            }
        }
    }
}

impl std::error::Error for StorageError {}

/// Append only sink for per file results. Implementations must accept concurrent
/// calls, each one is an independent single row write.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Persist: Send + Sync + 'static {
    async fn persist(&self, record: &PredictionRecord) -> Result<(), StorageError>;
}
