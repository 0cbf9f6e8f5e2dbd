use super::storage::{Persist, StorageError};
use crate::aggregation::PredictionRecord;

use async_trait::async_trait;
use log::{error, warn};
use serde::Deserialize;
use tokio::time::{sleep, Duration};

fn default_max_retries() -> usize {
    3
}

fn default_base_interval_secs() -> u64 {
    2
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_base_interval_secs")]
    pub base_interval_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_interval_secs: default_base_interval_secs(),
        }
    }
}

impl RetrySettings {
    /// Waiting time before the given retry, `base ^ retry` seconds.
    pub fn backoff(&self, retry: usize) -> Duration {
        Duration::from_secs(self.base_interval_secs.saturating_pow(retry as u32))
    }
}

/// Wraps a sink with bounded retries. A record that still fails after the last
/// retry is dropped and logged in full so it can be recovered by hand.
pub struct Retrier<S> {
    inner: S,
    settings: RetrySettings,
}

impl<S> Retrier<S>
where
    S: Persist,
{
    pub fn new(inner: S, settings: RetrySettings) -> Self {
        Self { inner, settings }
    }
}

#[async_trait]
impl<S> Persist for Retrier<S>
where
    S: Persist,
{
    async fn persist(&self, record: &PredictionRecord) -> Result<(), StorageError> {
        let mut retry = 0;

        loop {
            match self.inner.persist(record).await {
                Ok(()) => return Ok(()),
                Err(e) if retry < self.settings.max_retries => {
                    retry += 1;
                    let backoff = self.settings.backoff(retry);
                    warn!(
                        "failed to store prediction ({}), retry {}/{} in {:?}",
                        e, retry, self.settings.max_retries, backoff
                    );
                    sleep(backoff).await;
                }
                Err(e) => {
                    error!(
                        "dropping prediction after {} attempts: {:?}",
                        retry + 1,
                        record
                    );
                    return Err(StorageError::RetriesExhausted {
                        attempts: retry + 1,
                        last: Box::new(e),
                    });
                }
            }
        }
    }
}
