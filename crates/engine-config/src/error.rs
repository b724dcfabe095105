use std::{io, path::PathBuf};
use thiserror::Error;

/// Errors raised while loading or validating a job configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Every problem found, reported together.
    #[error("Config validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("Environment variable `{var}` referenced by store `{store}` is not set")]
    MissingVariable { store: String, var: String },

    #[error("Unterminated variable reference in store `{0}`")]
    UnterminatedVariable(String),
}
