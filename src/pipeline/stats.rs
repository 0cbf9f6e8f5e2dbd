use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the watcher, the dispatcher and every file task.
#[derive(Debug, Default)]
pub struct PipelineStats {
    submitted: AtomicU64,
    queued: AtomicU64,
    in_progress: AtomicU64,
    persisted: AtomicU64,
    empty: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub queued: u64,
    pub in_progress: u64,
    pub persisted: u64,
    pub empty: u64,
    pub failed: u64,
}

impl PipelineStats {
    /// Returns the queue depth including the new file.
    pub(crate) fn enqueued(&self) -> u64 {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.queued.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn rejected(&self) {
        self.submitted.fetch_sub(1, Ordering::Relaxed);
        self.queued.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn started(&self) {
        self.queued.fetch_sub(1, Ordering::AcqRel);
        self.in_progress.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn persisted(&self) {
        self.finish(&self.persisted);
    }

    pub(crate) fn empty(&self) {
        self.finish(&self.empty);
    }

    pub(crate) fn failed(&self) {
        self.finish(&self.failed);
    }

    fn finish(&self, counter: &AtomicU64) {
        self.in_progress.fetch_sub(1, Ordering::AcqRel);
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Acquire),
            in_progress: self.in_progress.load(Ordering::Acquire),
            persisted: self.persisted.load(Ordering::Relaxed),
            empty: self.empty.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
