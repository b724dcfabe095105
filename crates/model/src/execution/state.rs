use crate::execution::{options::SyncOptions, step::StepKind};
use serde::{Deserialize, Serialize};

/// Resumable position of the table currently being transferred.
///
/// Lives only for the duration of one transfer step: it is created on the
/// first invocation for a table and dropped once the table reports completion.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProgressState {
    pub table: String,
    /// Rows already committed to the shadow table.
    pub offset: u64,
    /// Source row count sampled once, before the first chunk.
    pub total: u64,
    /// Columns giving the rows a stable order across chunks.
    pub order_by: Vec<String>,
    /// Whether `total` and `order_by` have been sampled.
    pub prepared: bool,
    /// Consecutive failed attempts at the current offset.
    pub failures: u32,
    pub fraction: f64,
}

impl ProgressState {
    pub fn new(table: &str) -> Self {
        ProgressState {
            table: table.to_string(),
            offset: 0,
            total: 0,
            order_by: Vec::new(),
            prepared: false,
            failures: 0,
            fraction: 0.0,
        }
    }

    pub fn prepare(&mut self, total: u64, order_by: Vec<String>) {
        self.total = total;
        self.order_by = order_by;
        self.prepared = true;
    }

    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.offset)
    }

    /// Records a committed chunk of `transferred` rows out of `requested`
    /// and returns the new completion fraction.
    ///
    /// A short read means the source holds fewer rows than were sampled;
    /// the table is then complete rather than polled forever.
    pub fn record_chunk(&mut self, requested: u64, transferred: u64) -> f64 {
        self.offset += transferred.min(self.remaining());
        self.failures = 0;
        self.fraction = if self.total == 0 || transferred < requested {
            1.0
        } else {
            (self.offset as f64 / self.total as f64).min(1.0)
        };
        self.fraction
    }

    /// Moves the offset up to `committed`, the rows the shadow table already
    /// holds, and returns how many rows were skipped that way.
    ///
    /// Covers a chunk that was committed by an invocation whose progress
    /// was never persisted. The offset never moves backwards.
    pub fn reconcile(&mut self, committed: u64) -> u64 {
        let committed = committed.min(self.total);
        if committed <= self.offset {
            return 0;
        }
        let skipped = committed - self.offset;
        self.offset = committed;
        self.failures = 0;
        skipped
    }

    pub fn is_finished(&self) -> bool {
        self.fraction >= 1.0
    }
}

/// Messages and errors accumulated over the whole job.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct JobResults {
    pub messages: Vec<String>,
    pub errors: Vec<String>,
}

impl JobResults {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Everything the engine needs to re-enter a job between invocations.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct JobState {
    /// Options captured on the first invocation of the job.
    pub options: Option<SyncOptions>,
    /// Phase-local progress; `None` outside of a transfer.
    pub progress: Option<ProgressState>,
    pub completed: Vec<StepKind>,
    /// Tables whose shadow cannot be trusted and must not be cut over.
    pub failed_tables: Vec<String>,
    /// Tables whose shadow was created by this job.
    pub shadows: Vec<String>,
    pub results: JobResults,
}

impl JobState {
    /// Captures `supplied` on the first call; later calls keep the original.
    /// Returns `true` when `supplied` differs from the captured options.
    pub fn capture_options(&mut self, supplied: &SyncOptions) -> bool {
        match &self.options {
            Some(captured) => captured != supplied,
            None => {
                self.options = Some(supplied.clone());
                false
            }
        }
    }

    pub fn is_completed(&self, step: &StepKind) -> bool {
        self.completed.contains(step)
    }

    /// Marks `step` as done and drops its phase-local state.
    pub fn complete(&mut self, step: StepKind) {
        self.progress = None;
        if !self.completed.contains(&step) {
            self.completed.push(step);
        }
    }

    pub fn mark_table_failed(&mut self, table: &str) {
        if !self.is_table_failed(table) {
            self.failed_tables.push(table.to_string());
        }
    }

    pub fn is_table_failed(&self, table: &str) -> bool {
        self.failed_tables.iter().any(|t| t == table)
    }

    pub fn record_shadow(&mut self, table: &str) {
        if !self.has_shadow(table) {
            self.shadows.push(table.to_string());
        }
    }

    pub fn has_shadow(&self, table: &str) -> bool {
        self.shadows.iter().any(|t| t == table)
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.results.errors.push(error.into());
    }

    pub fn record_message(&mut self, message: impl Into<String>) {
        self.results.messages.push(message.into());
    }

    pub fn current_table(&self) -> Option<&str> {
        self.progress.as_ref().map(|p| p.table.as_str())
    }

    pub fn current_offset(&self) -> u64 {
        self.progress.as_ref().map(|p| p.offset).unwrap_or(0)
    }
}
