use connectors::{error::AdapterError, sql::base::error::DbError};
use thiserror::Error;

/// Failures creating a shadow table.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Source table `{0}` does not exist")]
    SourceMissing(String),

    #[error("Shadow table `{0}` already exists")]
    ShadowExists(String),

    #[error("Failed to read the definition of `{table}`: {source}")]
    Definition {
        table: String,
        #[source]
        source: DbError,
    },

    #[error("Unexpected definition for `{0}`: no CREATE TABLE header")]
    Rewrite(String),

    #[error("Destination rejected shadow table `{table}`: {source}")]
    Rejected {
        table: String,
        #[source]
        source: DbError,
    },
}

/// Failures copying one chunk of rows.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Failed to count rows of `{table}`: {source}")]
    Count {
        table: String,
        #[source]
        source: DbError,
    },

    #[error("Failed to resolve the ordering key of `{table}`: {source}")]
    OrderingKey {
        table: String,
        #[source]
        source: DbError,
    },

    #[error("Failed to read `{table}` from offset {offset}: {source}")]
    Fetch {
        table: String,
        offset: u64,
        #[source]
        source: DbError,
    },

    #[error("Failed to insert rows {offset}..{end} into `{table}`: {source}")]
    Insert {
        table: String,
        offset: u64,
        end: u64,
        #[source]
        source: DbError,
    },
}

/// Failures renaming tables during cutover.
#[derive(Error, Debug)]
pub enum CutoverError {
    #[error("Failed to look up `{table}` before cutover: {source}")]
    Lookup {
        table: String,
        #[source]
        source: DbError,
    },

    #[error("Failed to cut over `{table}`: {source}")]
    Rename {
        table: String,
        #[source]
        source: DbError,
    },

    #[error("Failed to cut over tables {tables}: {source}")]
    Batch {
        tables: String,
        #[source]
        source: DbError,
    },
}

/// Any failure raised inside a single step.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Cutover error: {0}")]
    Cutover(#[from] CutoverError),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Table `{0}` is not part of this job")]
    UnknownTable(String),

    #[error("Job state carries no sync options")]
    MissingOptions,
}

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("State database error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Failed to encode or decode state: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Invalid job id `{0}`: must be non-empty and must not contain ':'")]
    InvalidJobId(String),
}

#[derive(Error, Debug)]
pub enum ProgressError {
    #[error("Failed to read job state: {0}")]
    Store(#[from] StateStoreError),

    #[error("No job with id `{0}`")]
    JobNotFound(String),
}
