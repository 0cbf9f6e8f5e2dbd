use crate::aggregation::PredictionRecord;
use crate::capture::{CaptureRotator, RotationError};
use crate::config::{ConfigCache, ConfigErr};
use crate::handler::routes;
use crate::pipeline::{
    analyze_capture, CapturePipeline, PipelineError, PipelineSettings, ProcessingError,
};
use crate::scoring::{Score, ScoringAdapter, ScoringError};
use crate::settings::DetectorSettings;
use crate::storage::{ClickhouseState, Persist, Retrier};

use actix_web::{middleware, web, App, HttpServer};
use chrono::Utc;
use log::{error, info, warn};
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug)]
pub enum AppInitErr {
    Config(ConfigErr),
    Scoring(ScoringError),
    Pipeline(PipelineError),
    Processing(ProcessingError),
    Capture(RotationError),
    Io(io::Error),
}

impl From<ConfigErr> for AppInitErr {
    fn from(e: ConfigErr) -> Self {
        Self::Config(e)
    }
}

impl From<ScoringError> for AppInitErr {
    fn from(e: ScoringError) -> Self {
        Self::Scoring(e)
    }
}

impl From<PipelineError> for AppInitErr {
    fn from(e: PipelineError) -> Self {
        Self::Pipeline(e)
    }
}

impl From<ProcessingError> for AppInitErr {
    fn from(e: ProcessingError) -> Self {
        Self::Processing(e)
    }
}

impl From<RotationError> for AppInitErr {
    fn from(e: RotationError) -> Self {
        Self::Capture(e)
    }
}

impl From<io::Error> for AppInitErr {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl fmt::Display for AppInitErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{}", e),
            Self::Scoring(e) => write!(f, "unable to load model artifacts: {}", e),
            Self::Pipeline(e) => write!(f, "{}", e),
            Self::Processing(e) => write!(f, "capture failed at stage {}: {}", e.stage(), e),
            Self::Capture(e) => write!(f, "{}", e),
            Self::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AppInitErr {}

pub struct ApplicationState {
    pub config: ConfigCache,
    pub settings: DetectorSettings,
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received interrupt"),
        Err(e) => error!("unable to listen for interrupt: {}", e),
    }
}

/// `None` when the capture held nothing to score, a per-file failure is an error.
fn analyze_file(
    path: &Path,
    include_ipv6: bool,
    scorer: &dyn Score,
) -> Result<Option<PredictionRecord>, AppInitErr> {
    let analysis = analyze_capture(path, include_ipv6, scorer)?;
    Ok(analysis.into_record(Utc::now()))
}

impl ApplicationState {
    pub fn new(config_path: &str) -> Result<Self, AppInitErr> {
        let config = ConfigCache::new(config_path)?;
        let settings = config.get_config::<DetectorSettings>()?;
        settings.validate()?;
        info!("configuration loaded from {} and environment", config.path());

        Ok(Self { config, settings })
    }

    pub fn scorer(&self) -> Result<Arc<dyn Score>, AppInitErr> {
        let adapter = ScoringAdapter::load(&self.settings.model)?;
        info!("model artifacts loaded from {:?}", self.settings.model.model_path);

        Ok(Arc::new(adapter))
    }

    /// Runs the pipeline and the probe endpoints until interrupted.
    pub async fn watch(&self) -> Result<(), AppInitErr> {
        let scorer = self.scorer()?;

        let clickhouse = ClickhouseState::new(self.settings.clickhouse_settings.clone());
        if let Err(e) = clickhouse.ping().await {
            warn!("clickhouse not reachable yet, records will be retried: {}", e);
        }
        let sink: Arc<dyn Persist> =
            Arc::new(Retrier::new(clickhouse, self.settings.storage_retry.clone()));

        std::fs::create_dir_all(&self.settings.watch_dir)?;
        let pipeline = CapturePipeline::new(PipelineSettings::from(&self.settings), scorer, sink);

        let stats = pipeline.stats();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(stats.clone()))
                .wrap(middleware::Logger::default())
                .configure(routes)
        })
        .bind(("0.0.0.0", self.settings.http_port))?
        .disable_signals()
        .run();
        let server_handle = server.handle();
        actix_web::rt::spawn(server);
        info!("probe endpoints on port {}", self.settings.http_port);

        let res = pipeline.run(shutdown_signal()).await;
        server_handle.stop(true).await;

        res.map_err(AppInitErr::from)
    }

    /// Scores one capture without storing anything.
    pub fn analyze(&self, path: &Path) -> Result<Option<PredictionRecord>, AppInitErr> {
        let scorer = self.scorer()?;
        analyze_file(path, self.settings.include_ipv6, scorer.as_ref())
    }

    pub async fn capture(&self) -> Result<(), AppInitErr> {
        let rotator = CaptureRotator::new(
            self.settings.capture_settings()?.clone(),
            &self.settings.watch_dir,
            &self.settings.temp_marker,
            &self.settings.capture_extension,
        );

        rotator.run(shutdown_signal()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::packet::tests::arp_frame;
    use crate::flows::reader::tests::write_pcap;
    use crate::pipeline::worker::tests::three_packet_capture;
    use crate::scoring::MockScore;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_analyze_scores_capture() {
        let capture = three_packet_capture();
        let mut scorer = MockScore::new();
        scorer
            .expect_score()
            .returning(|features| Ok(vec!["SYN".to_owned(); features.len()]));

        let record = analyze_file(capture.path(), false, &scorer).unwrap().unwrap();

        assert_eq!(record.total_packets, 3);
        assert!(record.attack);
    }

    #[test]
    fn test_analyze_without_flows_gives_nothing() {
        let capture = write_pcap(&[(10, arp_frame())]);
        let mut scorer = MockScore::new();
        scorer.expect_score().never();

        assert!(analyze_file(capture.path(), false, &scorer).unwrap().is_none());
    }

    #[test]
    fn test_analyze_unreadable_capture_is_an_error() {
        let mut scorer = MockScore::new();
        scorer.expect_score().never();

        let res = analyze_file(Path::new("/nonexistent/bad.pcap"), false, &scorer);

        match res {
            Err(e @ AppInitErr::Processing(ProcessingError::Read(_))) => {
                assert!(e.to_string().starts_with("capture failed at stage read"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
