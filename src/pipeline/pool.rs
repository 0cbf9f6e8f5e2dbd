use super::stats::PipelineStats;
use super::worker::{FileOutcome, FileProcessor};

use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

#[derive(Debug)]
pub enum Job {
    Analyze(PathBuf),
    /// Stop accepting files, finish the ones already queued.
    Drain,
}

/// Enqueue side of the pool. Never blocks, safe to call from the watcher thread.
#[derive(Clone)]
pub struct Submitter {
    tx: mpsc::UnboundedSender<Job>,
    stats: Arc<PipelineStats>,
    queue_warn_threshold: usize,
}

impl Submitter {
    pub fn submit(&self, path: PathBuf) -> bool {
        let depth = self.stats.enqueued();

        match self.tx.send(Job::Analyze(path)) {
            Ok(()) => {
                if depth > self.queue_warn_threshold as u64 {
                    warn!(
                        "{} capture files waiting for a worker, processing falls behind",
                        depth
                    );
                }
                true
            }
            Err(mpsc::error::SendError(job)) => {
                self.stats.rejected();
                warn!("pipeline is shutting down, dropping {:?}", job);
                false
            }
        }
    }

    pub fn drain(&self) {
        if self.tx.send(Job::Drain).is_err() {
            debug!("pool already drained");
        }
    }
}

/// Runs at most `max_workers` files at once, in submission order.
pub struct WorkerPool {
    rx: mpsc::UnboundedReceiver<Job>,
    processor: FileProcessor,
    permits: Arc<Semaphore>,
    max_workers: usize,
    stats: Arc<PipelineStats>,
}

pub fn worker_pool(
    processor: FileProcessor,
    max_workers: usize,
    queue_warn_threshold: usize,
    stats: Arc<PipelineStats>,
) -> (Submitter, WorkerPool) {
    let (tx, rx) = mpsc::unbounded_channel();
    let max_workers = max_workers.max(1);

    let submitter = Submitter {
        tx,
        stats: stats.clone(),
        queue_warn_threshold,
    };

    let pool = WorkerPool {
        rx,
        processor,
        permits: Arc::new(Semaphore::new(max_workers)),
        max_workers,
        stats,
    };

    (submitter, pool)
}

impl WorkerPool {
    /// Returns once a drain was requested (or every submitter is gone) and all
    /// queued and running files are done.
    pub async fn run(mut self) {
        info!("worker pool started with {} workers", self.max_workers);

        while let Some(job) = self.rx.recv().await {
            match job {
                Job::Analyze(path) => self.dispatch(path).await,
                Job::Drain => {
                    debug!("draining capture queue");
                    self.rx.close();
                }
            }
        }

        // every permit back means every file task has finished
        if self
            .permits
            .acquire_many(self.max_workers as u32)
            .await
            .is_err()
        {
            error!("worker semaphore closed before all files finished");
        }
        info!("worker pool stopped");
    }

    async fn dispatch(&self, path: PathBuf) {
        let permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                error!("{}: worker semaphore closed, file skipped", path.display());
                return;
            }
        };

        let processor = self.processor.clone();
        let stats = self.stats.clone();
        stats.started();

        tokio::spawn(async move {
            let _permit = permit;
            let display = path.display().to_string();

            match tokio::spawn(async move { processor.process(path).await }).await {
                Ok(Ok(FileOutcome::Persisted(_))) => stats.persisted(),
                Ok(Ok(_)) => stats.empty(),
                Ok(Err(e)) => {
                    error!("{}: failed at stage {}: {}", display, e.stage(), e);
                    stats.failed();
                }
                Err(e) => {
                    error!("{}: failed at stage worker: {}", display, e);
                    stats.failed();
                }
            }
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pipeline::worker::tests::three_packet_capture;
    use crate::scoring::MockScore;
    use crate::storage::storage::MockPersist;
    use crate::storage::StorageError;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn processor(sink: MockPersist) -> FileProcessor {
        let mut scorer = MockScore::new();
        scorer
            .expect_score()
            .returning(|features| Ok(vec!["BENIGN".to_owned(); features.len()]));
        FileProcessor::new(Arc::new(scorer), Arc::new(sink), false)
    }

    pub fn idle_pool() -> (Submitter, WorkerPool) {
        worker_pool(
            processor(MockPersist::new()),
            1,
            64,
            Arc::new(PipelineStats::default()),
        )
    }

    #[tokio::test]
    async fn test_drain_finishes_every_queued_file() {
        let captures: Vec<_> = (0..4).map(|_| three_packet_capture()).collect();
        let stored = Arc::new(AtomicUsize::new(0));
        let counter = stored.clone();

        let mut sink = MockPersist::new();
        sink.expect_persist().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let stats = Arc::new(PipelineStats::default());
        let (submitter, pool) = worker_pool(processor(sink), 2, 64, stats.clone());
        let handle = tokio::spawn(pool.run());

        for capture in &captures {
            assert!(submitter.submit(capture.path().to_path_buf()));
        }
        submitter.drain();
        handle.await.unwrap();

        assert_eq!(stored.load(Ordering::SeqCst), 4);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.persisted, 4);
        assert_eq!(snapshot.queued, 0);
        assert_eq!(snapshot.in_progress, 0);
    }

    #[tokio::test]
    async fn test_failed_file_does_not_stop_the_pool() {
        let good = three_packet_capture();
        let mut sink = MockPersist::new();
        sink.expect_persist().returning(|_| Ok(()));

        let stats = Arc::new(PipelineStats::default());
        let (submitter, pool) = worker_pool(processor(sink), 1, 64, stats.clone());
        let handle = tokio::spawn(pool.run());

        submitter.submit(PathBuf::from("/nonexistent/first.pcap"));
        submitter.submit(good.path().to_path_buf());
        submitter.drain();
        handle.await.unwrap();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.persisted, 1);
    }

    #[tokio::test]
    async fn test_storage_failure_counts_as_failed() {
        let capture = three_packet_capture();
        let mut sink = MockPersist::new();
        sink.expect_persist()
            .returning(|_| Err(StorageError::Connection("refused".into())));

        let stats = Arc::new(PipelineStats::default());
        let (submitter, pool) = worker_pool(processor(sink), 3, 64, stats.clone());
        let handle = tokio::spawn(pool.run());

        submitter.submit(capture.path().to_path_buf());
        submitter.drain();
        handle.await.unwrap();

        assert_eq!(stats.snapshot().failed, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_never_more_files_in_flight_than_workers() {
        let captures: Vec<_> = (0..6).map(|_| three_packet_capture()).collect();
        let live = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut sink = MockPersist::new();
        let (live_in_sink, peak_in_sink) = (live.clone(), peak.clone());
        sink.expect_persist().returning(move |_| {
            let now = live_in_sink.fetch_add(1, Ordering::SeqCst) + 1;
            peak_in_sink.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(50));
            live_in_sink.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        });

        let stats = Arc::new(PipelineStats::default());
        let (submitter, pool) = worker_pool(processor(sink), 2, 64, stats.clone());
        let handle = tokio::spawn(pool.run());

        for capture in &captures {
            assert!(submitter.submit(capture.path().to_path_buf()));
        }
        submitter.drain();
        handle.await.unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(stats.snapshot().persisted, 6);
    }

    #[tokio::test]
    async fn test_submit_after_drain_is_rejected() {
        let stats = Arc::new(PipelineStats::default());
        let (submitter, pool) =
            worker_pool(processor(MockPersist::new()), 1, 64, stats.clone());

        submitter.drain();
        pool.run().await;

        assert!(!submitter.submit(PathBuf::from("late.pcap")));
        assert_eq!(stats.snapshot().submitted, 0);
    }
}
