use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;

use crate::application_state::{AppInitErr, ApplicationState};
use crate::consts::CONFIG_PATH;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Yaml configuration, overridden by DETECTOR__* environment variables
    #[arg(long, global = true, default_value = CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: ActionRunner,
}

#[derive(Subcommand)]
pub enum ActionRunner {
    // Watch the capture directory, score and store every finished capture
    Watch,

    // Score a single capture file and print the result
    Analyze { capture_path: PathBuf },

    // Capture traffic in a loop, publishing one file per run
    Capture,
}

impl ActionRunner {
    pub async fn run() -> Result<(), AppInitErr> {
        let cli = Cli::parse();
        let state = ApplicationState::new(&cli.config)?;

        match &cli.command {
            Self::Watch => {
                info!("Watching {:?}", state.settings.watch_dir);
                state.watch().await
            }
            Self::Analyze { capture_path } => {
                info!("Analyzing {:?}", capture_path);
                match state.analyze(capture_path)? {
                    Some(record) => match serde_json::to_string_pretty(&record) {
                        Ok(json) => println!("{}", json),
                        Err(e) => warn!("unable to render result: {}", e),
                    },
                    None => warn!("{:?} produced no prediction", capture_path),
                }
                Ok(())
            }
            Self::Capture => {
                info!("Capturing into {:?}", state.settings.watch_dir);
                state.capture().await
            }
        }
    }
}
