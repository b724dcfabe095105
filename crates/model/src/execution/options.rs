use crate::core::identifiers::shadow_table_name;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How many rows of a table one invocation copies.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChunkSize {
    /// The whole table in a single invocation.
    All,
    Rows(u64),
}

impl ChunkSize {
    /// Size of the next window given how many rows are still to copy.
    pub fn window(&self, remaining: u64) -> u64 {
        match self {
            ChunkSize::All => remaining,
            ChunkSize::Rows(n) => (*n).min(remaining),
        }
    }
}

impl fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkSize::All => f.write_str("all"),
            ChunkSize::Rows(n) => write!(f, "{n}"),
        }
    }
}

/// What a step does with a failure once it has been recorded.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Record the error and keep advancing through the remaining steps.
    #[default]
    Continue,
    /// Stop the job at the failing step.
    Abort,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CutoverMode {
    /// One atomic rename per table; a failed table does not hold back the others.
    #[default]
    PerTable,
    /// A single rename statement covering the whole table set.
    Atomic,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub chunk_size: ChunkSize,
}

impl TableSpec {
    pub fn new(name: impl Into<String>, chunk_size: ChunkSize) -> Self {
        TableSpec {
            name: name.into(),
            chunk_size,
        }
    }
}

/// Job configuration, fixed when the job starts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Store the rows are read from.
    pub source: String,
    /// Store receiving the shadow tables and the cutover.
    pub destination: String,
    /// Job start time (unix seconds); tags every shadow table of the job.
    pub generation: i64,
    pub tables: Vec<TableSpec>,
    pub on_error: ErrorPolicy,
    pub cutover: CutoverMode,
    /// Consecutive failures of one chunk before its table is given up.
    pub max_chunk_attempts: u32,
}

impl SyncOptions {
    pub fn table(&self, name: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    pub fn shadow_name(&self, table: &str) -> String {
        shadow_table_name(table, self.generation)
    }

    pub fn aborts_on_error(&self) -> bool {
        self.on_error == ErrorPolicy::Abort
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_never_exceeds_remaining() {
        assert_eq!(ChunkSize::Rows(100).window(250), 100);
        assert_eq!(ChunkSize::Rows(100).window(50), 50);
        assert_eq!(ChunkSize::All.window(10), 10);
        assert_eq!(ChunkSize::All.window(0), 0);
    }

    #[test]
    fn policies_serialize_as_snake_case() {
        let json = serde_json::to_string(&CutoverMode::PerTable).unwrap();
        assert_eq!(json, "\"per_table\"");
        let policy: ErrorPolicy = serde_json::from_str("\"abort\"").unwrap();
        assert_eq!(policy, ErrorPolicy::Abort);
    }
}
