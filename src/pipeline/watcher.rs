use super::errors::PipelineError;
use super::pool::Submitter;

use log::{debug, error, info};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};

/// Decides which filesystem events mean "a finished capture is ready".
#[derive(Debug, Clone)]
pub struct ReadyFilter {
    temp_marker: String,
    extension: String,
}

impl ReadyFilter {
    pub fn new(temp_marker: &str, extension: &str) -> Self {
        Self {
            temp_marker: temp_marker.to_owned(),
            extension: extension.trim_start_matches('.').to_owned(),
        }
    }

    /// Destination of a rename event, when it names a ready capture.
    pub fn ready_path(&self, event: &Event) -> Option<PathBuf> {
        // inotify reports a paired rename as `To` and again as `Both`, only the
        // former is taken so a file is submitted once
        let destination = match event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::To))
            | EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event.paths.last(),
            _ => None,
        }?;

        if self.is_ready_file(destination) {
            Some(destination.to_path_buf())
        } else {
            None
        }
    }

    pub fn is_ready_file(&self, path: &Path) -> bool {
        let has_extension = path
            .extension()
            .map(|ext| ext.to_string_lossy() == self.extension.as_str())
            .unwrap_or(false);
        let is_temporary = path
            .file_name()
            .map(|name| name.to_string_lossy().contains(self.temp_marker.as_str()))
            .unwrap_or(true);

        has_extension && !is_temporary && path.is_file()
    }
}

/// Forwards ready captures of one directory to the worker pool until dropped.
pub struct CaptureWatcher {
    watcher: RecommendedWatcher,
    dir: PathBuf,
}

impl CaptureWatcher {
    pub fn start(
        dir: &Path,
        filter: ReadyFilter,
        submitter: Submitter,
    ) -> Result<Self, PipelineError> {
        if !dir.is_dir() {
            return Err(PipelineError::WatchDirMissing(dir.to_path_buf()));
        }

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if let Some(path) = filter.ready_path(&event) {
                        debug!("capture ready: {}", path.display());
                        submitter.submit(path);
                    }
                }
                Err(e) => error!("capture directory watch error: {}", e),
            },
            NotifyConfig::default(),
        )?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        info!("watching {} for finished captures", dir.display());
        Ok(Self {
            watcher,
            dir: dir.to_path_buf(),
        })
    }

    pub fn stop(mut self) {
        if let Err(e) = self.watcher.unwatch(&self.dir) {
            debug!("unwatch {}: {}", self.dir.display(), e);
        }
        info!("stopped watching {}", self.dir.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::CreateKind;
    use pretty_assertions::assert_eq;
    use std::fs;
    use test_case::test_case;

    fn rename(mode: RenameMode, paths: &[&Path]) -> Event {
        paths.iter().fold(
            Event::new(EventKind::Modify(ModifyKind::Name(mode))),
            |event, path| event.add_path(path.to_path_buf()),
        )
    }

    #[test_case("capture_001.pcap", true ; "finished capture")]
    #[test_case("temp_capture_001.pcap", false ; "still being written")]
    #[test_case("capture_001.txt", false ; "other extension")]
    #[test_case("capture_001", false ; "no extension")]
    fn test_is_ready_file(name: &str, expected: bool) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        fs::write(&path, b"x").unwrap();

        let filter = ReadyFilter::new("temp_", "pcap");

        assert_eq!(filter.is_ready_file(&path), expected);
    }

    #[test]
    fn test_directory_is_never_ready() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("nested.pcap");
        fs::create_dir(&sub).unwrap();

        assert!(!ReadyFilter::new("temp_", "pcap").is_ready_file(&sub));
    }

    #[test]
    fn test_marker_in_directory_name_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("temp_captures");
        fs::create_dir(&parent).unwrap();
        let path = parent.join("capture.pcap");
        fs::write(&path, b"x").unwrap();

        assert!(ReadyFilter::new("temp_", ".pcap").is_ready_file(&path));
    }

    #[test]
    fn test_only_rename_destination_is_ready() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("temp_a.pcap");
        let to = dir.path().join("a.pcap");
        fs::write(&to, b"x").unwrap();

        let filter = ReadyFilter::new("temp_", "pcap");

        assert_eq!(
            filter.ready_path(&rename(RenameMode::To, &[&to])),
            Some(to.clone())
        );
        assert_eq!(
            filter.ready_path(&rename(RenameMode::Any, &[&to])),
            Some(to.clone())
        );
        assert_eq!(filter.ready_path(&rename(RenameMode::Both, &[&from, &to])), None);
        assert_eq!(filter.ready_path(&rename(RenameMode::From, &[&from])), None);
    }

    #[test]
    fn test_create_and_write_events_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pcap");
        fs::write(&path, b"x").unwrap();

        let filter = ReadyFilter::new("temp_", "pcap");
        let created = Event::new(EventKind::Create(CreateKind::File)).add_path(path.clone());
        let written =
            Event::new(EventKind::Modify(ModifyKind::Data(notify::event::DataChange::Any)))
                .add_path(path);

        assert_eq!(filter.ready_path(&created), None);
        assert_eq!(filter.ready_path(&written), None);
    }

    #[test]
    fn test_missing_directory_is_rejected() {
        let (submitter, _pool) = crate::pipeline::pool::tests::idle_pool();

        let res = CaptureWatcher::start(
            Path::new("/nonexistent/captures"),
            ReadyFilter::new("temp_", "pcap"),
            submitter,
        );

        assert!(matches!(res, Err(PipelineError::WatchDirMissing(_))));
    }
}
