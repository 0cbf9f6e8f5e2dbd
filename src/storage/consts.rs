use std::time::Duration;

pub const HANDLE_TIMEOUT: Duration = Duration::from_secs(3);
