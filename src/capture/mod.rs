use crate::consts::CAPTURE_RESTART_PAUSE;

use chrono::{Local, NaiveDateTime};
use log::{debug, error, info, warn};
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{sleep, timeout, Duration};

fn default_program() -> String {
    "tcpdump".to_owned()
}

fn default_args() -> Vec<String> {
    ["-i", "{interface}", "-U", "-w", "{output}", "-c", "{count}"]
        .iter()
        .map(|a| a.to_string())
        .collect()
}

fn default_interface() -> String {
    "any".to_owned()
}

fn default_packet_count() -> u64 {
    5000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_prefix() -> String {
    "capture".to_owned()
}

/// External capture program. `{interface}`, `{output}` and `{count}` in `args`
/// are substituted before every run.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CaptureSettings {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    #[serde(default = "default_interface")]
    pub interface: String,
    #[serde(default = "default_packet_count")]
    pub packet_count: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            interface: default_interface(),
            packet_count: default_packet_count(),
            timeout_secs: default_timeout_secs(),
            prefix: default_prefix(),
        }
    }
}

#[derive(Debug)]
pub enum RotationError {
    OutputDir(io::Error),
    Spawn(io::Error),
    Wait(io::Error),
    Rename(io::Error),
}

impl fmt::Display for RotationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::OutputDir(e) => write!(f, "unable to create capture directory: {}", e),
            Self::Spawn(e) => write!(f, "unable to start capture program: {}", e),
            Self::Wait(e) => write!(f, "capture program failed: {}", e),
            Self::Rename(e) => write!(f, "unable to publish capture: {}", e),
        }
    }
}

impl std::error::Error for RotationError {}

/// Writes fixed size captures under a temporary name and renames each one when
/// it is complete, which is what the pipeline watches for.
pub struct CaptureRotator {
    settings: CaptureSettings,
    dir: PathBuf,
    temp_marker: String,
    extension: String,
    counter: u64,
}

impl CaptureRotator {
    pub fn new(settings: CaptureSettings, dir: &Path, temp_marker: &str, extension: &str) -> Self {
        Self {
            settings,
            dir: dir.to_path_buf(),
            temp_marker: temp_marker.to_owned(),
            extension: extension.trim_start_matches('.').to_owned(),
            counter: 0,
        }
    }

    fn temp_path(&mut self, now: NaiveDateTime) -> PathBuf {
        self.counter += 1;
        self.dir.join(format!(
            "{}{}_{}_{}.{}",
            self.temp_marker,
            self.settings.prefix,
            now.format("%Y%m%d_%H%M%S"),
            self.counter,
            self.extension
        ))
    }

    /// Same directory, marker removed from the file name only.
    pub fn final_path(&self, temp: &Path) -> PathBuf {
        let name = temp
            .file_name()
            .map(|n| n.to_string_lossy().replacen(self.temp_marker.as_str(), "", 1))
            .unwrap_or_default();
        temp.with_file_name(name)
    }

    fn command_args(&self, output: &Path) -> Vec<String> {
        let output = output.to_string_lossy();
        let count = self.settings.packet_count.to_string();

        self.settings
            .args
            .iter()
            .map(|arg| {
                arg.replace("{interface}", &self.settings.interface)
                    .replace("{output}", &output)
                    .replace("{count}", &count)
            })
            .collect()
    }

    /// One capture run. `None` when the program produced no file.
    pub async fn rotate_once(&mut self) -> Result<Option<PathBuf>, RotationError> {
        let temp = self.temp_path(Local::now().naive_local());
        let args = self.command_args(&temp);
        debug!("{} {}", self.settings.program, args.join(" "));

        let mut child = Command::new(&self.settings.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(RotationError::Spawn)?;
        info!("capturing into {}", temp.display());

        let limit = Duration::from_secs(self.settings.timeout_secs);
        match timeout(limit, child.wait()).await {
            Ok(Ok(status)) if !status.success() => {
                warn!("capture program exited with {}", status);
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(RotationError::Wait(e)),
            Err(_) => {
                info!("capture timeout after {:?}, saving", limit);
                child.kill().await.map_err(RotationError::Wait)?;
            }
        }

        if !temp.is_file() {
            warn!("capture program left no file at {}", temp.display());
            return Ok(None);
        }

        let published = self.final_path(&temp);
        tokio::fs::rename(&temp, &published)
            .await
            .map_err(RotationError::Rename)?;

        Ok(Some(published))
    }

    /// Rotates until `shutdown` resolves. A running capture is killed on shutdown.
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), RotationError>
    where
        F: Future<Output = ()>,
    {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(RotationError::OutputDir)?;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("capture rotation stopped");
                    return Ok(());
                }
                res = self.rotate_once() => match res {
                    Ok(Some(path)) => info!("capture saved: {}", path.display()),
                    Ok(None) => sleep(CAPTURE_RESTART_PAUSE).await,
                    Err(e) => {
                        error!("{}", e);
                        sleep(CAPTURE_RESTART_PAUSE).await;
                    }
                },
            }
        }
    }
}
