pub mod clickhouse;
pub mod consts;
pub mod retrier;
pub mod storage;

pub use self::clickhouse::{ClickhouseSettings, ClickhouseState};
pub use retrier::{Retrier, RetrySettings};
pub use storage::{Persist, StorageError};
