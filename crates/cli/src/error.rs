use connectors::error::AdapterError;
use engine_config::error::ConfigError;
use engine_core::error::{ProgressError, StateStoreError};
use engine_runtime::error::RunnerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read env file: {0}")]
    EnvFile(String),

    #[error("Failed to connect to a store: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Failed to open the state database: {0}")]
    State(#[from] StateStoreError),

    #[error("Failed to load progress: {0}")]
    Progress(#[from] ProgressError),

    #[error("Failed to run the synchronization job: {0}")]
    Runner(#[from] RunnerError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("Unsupported connection kind: {0}")]
    UnsupportedConnectionKind(String),

    /// MySQL driver error.
    #[error("MySQL error: {0}")]
    MySql(#[from] mysql_async::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}
