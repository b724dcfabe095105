use connectors::error::AdapterError;
use engine_core::error::{StateStoreError, SyncError};
use thiserror::Error;

/// Errors that stop the step-runner itself, as opposed to errors of a step.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("State store error: {0}")]
    State(#[from] StateStoreError),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Shutdown was requested between two invocations; progress is saved.
    #[error("Shutdown requested")]
    ShutdownRequested,
}
