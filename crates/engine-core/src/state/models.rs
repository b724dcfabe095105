use crate::error::StateStoreError;
use chrono::{DateTime, Utc};
use model::execution::{
    options::SyncOptions,
    state::JobState,
    step::{Operation, StepKind},
};
use serde::{Deserialize, Serialize};

/// Everything persisted for one job between step invocations.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct JobRecord {
    pub job_id: String,
    pub operations: Vec<Operation>,
    /// Index of the operation the next invocation runs.
    pub cursor: usize,
    pub state: JobState,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(job_id: &str, operations: Vec<Operation>) -> Self {
        JobRecord {
            job_id: job_id.to_string(),
            operations,
            cursor: 0,
            state: JobState::default(),
            updated_at: Utc::now(),
        }
    }

    pub fn current(&self) -> Option<&Operation> {
        self.operations.get(self.cursor)
    }

    pub fn remaining(&self) -> &[Operation] {
        self.operations.get(self.cursor..).unwrap_or_default()
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.operations.len()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum WalEntry {
    JobStart {
        job_id: String,
        options_hash: String,
        at: DateTime<Utc>,
    },
    StepStart {
        job_id: String,
        step: StepKind,
    },
    ChunkCommit {
        job_id: String,
        table: String,
        offset: u64,
        rows: u64,
        at: DateTime<Utc>,
    },
    StepFailed {
        job_id: String,
        step: StepKind,
        error: String,
    },
    StepDone {
        job_id: String,
        step: StepKind,
    },
    JobDone {
        job_id: String,
        success: bool,
    },
}

impl WalEntry {
    pub fn job_id(&self) -> &str {
        match self {
            WalEntry::JobStart { job_id, .. } => job_id,
            WalEntry::StepStart { job_id, .. } => job_id,
            WalEntry::ChunkCommit { job_id, .. } => job_id,
            WalEntry::StepFailed { job_id, .. } => job_id,
            WalEntry::StepDone { job_id, .. } => job_id,
            WalEntry::JobDone { job_id, .. } => job_id,
        }
    }
}

/// Stable fingerprint of a set of options, used to spot drift between invocations.
pub fn options_hash(options: &SyncOptions) -> Result<String, StateStoreError> {
    let bytes = bincode::serialize(options)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::execution::options::{ChunkSize, CutoverMode, ErrorPolicy, TableSpec};

    fn options(generation: i64) -> SyncOptions {
        SyncOptions {
            source: "src".into(),
            destination: "dst".into(),
            generation,
            tables: vec![TableSpec::new("orders", ChunkSize::Rows(100))],
            on_error: ErrorPolicy::Continue,
            cutover: CutoverMode::PerTable,
            max_chunk_attempts: 3,
        }
    }

    #[test]
    fn hash_tracks_option_changes() {
        assert_eq!(options_hash(&options(1)).unwrap(), options_hash(&options(1)).unwrap());
        assert_ne!(options_hash(&options(1)).unwrap(), options_hash(&options(2)).unwrap());
    }

    #[test]
    fn remaining_starts_at_cursor() {
        let ops = vec![
            Operation::new(StepKind::Initialize, options(1)),
            Operation::new(StepKind::Cutover, options(1)),
        ];
        let mut record = JobRecord::new("job", ops);
        record.cursor = 1;
        assert_eq!(record.remaining().len(), 1);
        assert_eq!(record.current().map(|o| &o.step), Some(&StepKind::Cutover));

        record.cursor = 2;
        assert!(record.is_finished());
        assert!(record.remaining().is_empty());
    }
}
