use super::errors::ProcessingError;
use crate::aggregation::{aggregate, PredictionRecord};
use crate::features::extract_all;
use crate::flows::{read_capture, reconstruct};
use crate::scoring::Score;
use crate::storage::Persist;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task;

/// Result of the cpu bound part of a file: everything up to the labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Analysis {
    NoFlows {
        total_packets: usize,
    },
    NoPredictions {
        flows: usize,
        total_packets: usize,
    },
    Scored {
        labels: Vec<String>,
        total_packets: usize,
    },
}

impl Analysis {
    pub fn into_record(self, finished_at: DateTime<Utc>) -> Option<PredictionRecord> {
        match self {
            Self::Scored {
                labels,
                total_packets,
            } => Some(aggregate(&labels, total_packets, finished_at)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Persisted(PredictionRecord),
    NoFlows,
    NoPredictions,
}

/// Reads a capture, rebuilds its flows and labels every flow. Blocking.
pub fn analyze_capture(
    path: &Path,
    include_ipv6: bool,
    scorer: &dyn Score,
) -> Result<Analysis, ProcessingError> {
    let packets = read_capture(path, include_ipv6)?;
    let flows = reconstruct(packets);
    let total_packets = flows.total_packets();

    if flows.is_empty() {
        return Ok(Analysis::NoFlows { total_packets });
    }

    let features = extract_all(&flows);
    debug!(
        "{}: {} packets, {} flows",
        path.display(),
        total_packets,
        flows.len()
    );

    let labels = scorer.score(&features)?;
    if labels.is_empty() {
        return Ok(Analysis::NoPredictions {
            flows: flows.len(),
            total_packets,
        });
    }

    Ok(Analysis::Scored {
        labels,
        total_packets,
    })
}

/// Everything a file task needs, cloned into every spawned task.
#[derive(Clone)]
pub struct FileProcessor {
    scorer: Arc<dyn Score>,
    sink: Arc<dyn Persist>,
    include_ipv6: bool,
}

impl FileProcessor {
    pub fn new(scorer: Arc<dyn Score>, sink: Arc<dyn Persist>, include_ipv6: bool) -> Self {
        Self {
            scorer,
            sink,
            include_ipv6,
        }
    }

    pub async fn process(&self, path: PathBuf) -> Result<FileOutcome, ProcessingError> {
        let scorer = self.scorer.clone();
        let include_ipv6 = self.include_ipv6;
        let capture = path.clone();

        let analysis =
            task::spawn_blocking(move || analyze_capture(&capture, include_ipv6, scorer.as_ref()))
                .await
                .map_err(|e| ProcessingError::Panicked(e.to_string()))??;

        match analysis {
            Analysis::NoFlows { total_packets } => {
                info!(
                    "{}: no flows in {} packets, nothing to score",
                    path.display(),
                    total_packets
                );
                Ok(FileOutcome::NoFlows)
            }
            Analysis::NoPredictions { flows, .. } => {
                warn!(
                    "{}: model returned no predictions for {} flows",
                    path.display(),
                    flows
                );
                Ok(FileOutcome::NoPredictions)
            }
            Analysis::Scored {
                labels,
                total_packets,
            } => {
                let record = aggregate(&labels, total_packets, Utc::now());
                if !record.unrecognized.is_empty() {
                    warn!(
                        "{}: labels without a column: {:?}",
                        path.display(),
                        record.unrecognized
                    );
                }

                self.sink.persist(&record).await?;
                info!(
                    "{}: stored {} predictions, attack: {}",
                    path.display(),
                    record.benign + record.ldap + record.mssql + record.syn + record.udp,
                    record.attack
                );
                Ok(FileOutcome::Persisted(record))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::flows::packet::tests::{arp_frame, tcp_frame};
    use crate::flows::packet::tcp_flags::{ACK, SYN};
    use crate::flows::reader::tests::write_pcap;
    use crate::scoring::{MockScore, ScoringError};
    use crate::storage::storage::MockPersist;
    use crate::storage::StorageError;
    use pretty_assertions::assert_eq;

    pub fn three_packet_capture() -> tempfile::NamedTempFile {
        write_pcap(&[
            (1_000_000, tcp_frame([10, 0, 0, 1], [10, 0, 0, 2], 40000, 80, SYN)),
            (1_001_000, tcp_frame([10, 0, 0, 2], [10, 0, 0, 1], 80, 40000, SYN | ACK)),
            (1_002_000, tcp_frame([10, 0, 0, 1], [10, 0, 0, 2], 40000, 80, ACK)),
        ])
    }

    fn scorer_returning(labels: &'static [&'static str]) -> MockScore {
        let mut scorer = MockScore::new();
        scorer.expect_score().returning(move |features| {
            assert_eq!(features.len(), labels.len());
            Ok(labels.iter().map(|l| l.to_string()).collect())
        });
        scorer
    }

    #[test]
    fn test_analyze_single_flow_capture() {
        let file = three_packet_capture();
        let scorer = scorer_returning(&["SYN"]);

        let analysis = analyze_capture(file.path(), false, &scorer).unwrap();

        assert_eq!(
            analysis,
            Analysis::Scored {
                labels: vec!["SYN".to_owned()],
                total_packets: 3,
            }
        );
    }

    #[test]
    fn test_analyze_non_ip_capture_skips_scoring() {
        let file = write_pcap(&[(10, arp_frame()), (20, arp_frame())]);
        let mut scorer = MockScore::new();
        scorer.expect_score().never();

        let analysis = analyze_capture(file.path(), false, &scorer).unwrap();

        assert_eq!(analysis, Analysis::NoFlows { total_packets: 2 });
        assert_eq!(analysis.into_record(Utc::now()), None);
    }

    #[test]
    fn test_analyze_reports_scoring_failure() {
        let file = three_packet_capture();
        let mut scorer = MockScore::new();
        scorer
            .expect_score()
            .returning(|_| Err(ScoringError::Model("session closed".into())));

        let err = analyze_capture(file.path(), false, &scorer).unwrap_err();

        assert_eq!(err.stage(), "score");
    }

    #[tokio::test]
    async fn test_process_persists_one_record() {
        let file = three_packet_capture();
        let mut sink = MockPersist::new();
        sink.expect_persist()
            .withf(|record| record.syn == 1 && record.total_packets == 3 && record.attack)
            .times(1)
            .returning(|_| Ok(()));

        let processor =
            FileProcessor::new(Arc::new(scorer_returning(&["SYN"])), Arc::new(sink), false);

        let outcome = processor.process(file.path().to_path_buf()).await.unwrap();

        assert!(matches!(outcome, FileOutcome::Persisted(r) if r.syn == 1));
    }

    #[tokio::test]
    async fn test_process_skips_persistence_for_empty_predictions() {
        let file = three_packet_capture();
        let mut scorer = MockScore::new();
        scorer.expect_score().returning(|_| Ok(Vec::new()));
        let mut sink = MockPersist::new();
        sink.expect_persist().never();

        let processor = FileProcessor::new(Arc::new(scorer), Arc::new(sink), false);

        let outcome = processor.process(file.path().to_path_buf()).await.unwrap();

        assert_eq!(outcome, FileOutcome::NoPredictions);
    }

    #[tokio::test]
    async fn test_process_surfaces_storage_failure() {
        let file = three_packet_capture();
        let mut sink = MockPersist::new();
        sink.expect_persist()
            .returning(|_| Err(StorageError::Insert("readonly".into())));

        let processor =
            FileProcessor::new(Arc::new(scorer_returning(&["BENIGN"])), Arc::new(sink), false);

        let err = processor
            .process(file.path().to_path_buf())
            .await
            .unwrap_err();

        assert_eq!(err.stage(), "persist");
    }

    #[tokio::test]
    async fn test_process_missing_file_fails_at_read() {
        let processor = FileProcessor::new(
            Arc::new(MockScore::new()),
            Arc::new(MockPersist::new()),
            false,
        );

        let err = processor
            .process(PathBuf::from("/nonexistent/capture.pcap"))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), "read");
    }
}
