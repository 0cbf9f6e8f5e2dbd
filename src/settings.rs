use crate::capture::CaptureSettings;
use crate::config::ConfigErr;
use crate::storage::{ClickhouseSettings, RetrySettings};

use serde::Deserialize;
use std::path::PathBuf;

fn default_watch_dir() -> PathBuf {
    PathBuf::from("captures")
}

fn default_temp_marker() -> String {
    "temp_".to_owned()
}

fn default_capture_extension() -> String {
    "pcap".to_owned()
}

fn default_max_workers() -> usize {
    5
}

fn default_queue_warn_threshold() -> usize {
    64
}

fn default_http_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelSettings {
    pub model_path: PathBuf,
    pub scaler_path: PathBuf,
    pub encoder_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DetectorSettings {
    #[serde(default = "default_watch_dir")]
    pub watch_dir: PathBuf,

    #[serde(default = "default_temp_marker")]
    pub temp_marker: String,

    #[serde(default = "default_capture_extension")]
    pub capture_extension: String,

    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_queue_warn_threshold")]
    pub queue_warn_threshold: usize,

    // only IPv4 frames form flows unless enabled
    #[serde(default)]
    pub include_ipv6: bool,

    pub model: ModelSettings,

    pub clickhouse_settings: ClickhouseSettings,

    #[serde(default)]
    pub storage_retry: RetrySettings,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default)]
    pub capture: Option<CaptureSettings>,
}

impl DetectorSettings {
    pub fn validate(&self) -> Result<(), ConfigErr> {
        if self.max_workers == 0 {
            return Err(ConfigErr::MissingNeccessarySetting(
                "max_workers must be at least 1".to_owned(),
            ));
        }
        if self.temp_marker.is_empty() {
            return Err(ConfigErr::MissingNeccessarySetting("temp_marker".to_owned()));
        }
        if self.capture_extension.is_empty() {
            return Err(ConfigErr::MissingNeccessarySetting(
                "capture_extension".to_owned(),
            ));
        }

        Ok(())
    }

    pub fn capture_settings(&self) -> Result<&CaptureSettings, ConfigErr> {
        self.capture
            .as_ref()
            .ok_or_else(|| ConfigErr::MissingNeccessarySetting("capture".to_owned()))
    }
}
