use std::time::Duration;

pub const DEFAULT_ENV_VAR_PREFIX: &str = "DETECTOR";
pub const CONFIG_PATH: &str = "./detector.yaml";

pub const CAPTURE_READER_BUFFER_SIZE: usize = 1 << 20;
pub const MAX_STALLED_REFILLS: usize = 4;

pub const CAPTURE_RESTART_PAUSE: Duration = Duration::from_secs(1);
