pub mod errors;
pub mod pool;
pub mod stats;
pub mod watcher;
pub mod worker;

pub use errors::{PipelineError, ProcessingError};
pub use pool::{worker_pool, Job, Submitter, WorkerPool};
pub use stats::{PipelineStats, StatsSnapshot};
pub use watcher::{CaptureWatcher, ReadyFilter};
pub use worker::{analyze_capture, Analysis, FileOutcome, FileProcessor};

use crate::scoring::Score;
use crate::settings::DetectorSettings;
use crate::storage::Persist;

use log::{error, info};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub watch_dir: PathBuf,
    pub temp_marker: String,
    pub capture_extension: String,
    pub max_workers: usize,
    pub queue_warn_threshold: usize,
    pub include_ipv6: bool,
}

impl From<&DetectorSettings> for PipelineSettings {
    fn from(settings: &DetectorSettings) -> Self {
        Self {
            watch_dir: settings.watch_dir.clone(),
            temp_marker: settings.temp_marker.clone(),
            capture_extension: settings.capture_extension.clone(),
            max_workers: settings.max_workers,
            queue_warn_threshold: settings.queue_warn_threshold,
            include_ipv6: settings.include_ipv6,
        }
    }
}

/// Watched directory in, one persisted record per finished capture out.
pub struct CapturePipeline {
    settings: PipelineSettings,
    processor: FileProcessor,
    stats: Arc<PipelineStats>,
}

impl CapturePipeline {
    pub fn new(settings: PipelineSettings, scorer: Arc<dyn Score>, sink: Arc<dyn Persist>) -> Self {
        let processor = FileProcessor::new(scorer, sink, settings.include_ipv6);

        Self {
            settings,
            processor,
            stats: Arc::new(PipelineStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    /// Processes ready captures until `shutdown` resolves, then stops the watcher
    /// and waits for every queued and running file.
    pub async fn run<F>(self, shutdown: F) -> Result<(), PipelineError>
    where
        F: Future<Output = ()>,
    {
        let (submitter, pool) = worker_pool(
            self.processor,
            self.settings.max_workers,
            self.settings.queue_warn_threshold,
            self.stats.clone(),
        );
        let pool_task = tokio::spawn(pool.run());

        let filter = ReadyFilter::new(&self.settings.temp_marker, &self.settings.capture_extension);
        let watcher = CaptureWatcher::start(&self.settings.watch_dir, filter, submitter.clone())?;

        shutdown.await;
        info!("shutting down capture pipeline");

        watcher.stop();
        submitter.drain();

        if let Err(e) = pool_task.await {
            error!("worker pool ended abnormally: {}", e);
        }

        let stats = self.stats.snapshot();
        info!(
            "capture pipeline stopped: {} persisted, {} empty, {} failed",
            stats.persisted, stats.empty, stats.failed
        );
        Ok(())
    }
}
