use crate::{
    error::ProgressError,
    state::{StateStore, models::WalEntry},
};
use chrono::{DateTime, Utc};
use model::execution::step::StepKind;
use serde::Serialize;
use std::{fmt, sync::Arc};

#[derive(Clone)]
pub struct ProgressService {
    pub store: Arc<dyn StateStore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgressStage {
    Idle,
    Initializing,
    Transferring,
    CuttingOver,
    Done,
    Failed,
}

impl ProgressStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStage::Idle => "Idle",
            ProgressStage::Initializing => "Initializing",
            ProgressStage::Transferring => "Transferring",
            ProgressStage::CuttingOver => "CuttingOver",
            ProgressStage::Done => "Done",
            ProgressStage::Failed => "Failed",
        }
    }
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressStatus {
    pub job_id: String,
    pub stage: ProgressStage,
    /// Step the next invocation runs, if any.
    pub step: Option<String>,
    pub table: Option<String>,
    pub offset: u64,
    pub total: u64,
    pub fraction: f64,
    /// Rows committed over the whole job, from the WAL.
    pub rows_committed: u64,
    pub errors: Vec<String>,
    pub last_update: DateTime<Utc>,
}

impl ProgressService {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        ProgressService { store }
    }

    pub async fn job_status(&self, job_id: &str) -> Result<ProgressStatus, ProgressError> {
        let record = self
            .store
            .load_job(job_id)
            .await?
            .ok_or_else(|| ProgressError::JobNotFound(job_id.to_string()))?;
        let wal = self.store.iter_wal(job_id).await?;

        let mut started = false;
        let mut outcome = None;
        let mut rows_committed = 0;
        for entry in &wal {
            match entry {
                // A resumed job starts a step after its earlier JobDone.
                WalEntry::StepStart { .. } => {
                    started = true;
                    outcome = None;
                }
                WalEntry::ChunkCommit { rows, .. } => rows_committed += rows,
                WalEntry::JobDone { success, .. } => outcome = Some(*success),
                _ => {}
            }
        }

        let current = record.current().map(|op| &op.step);
        let stage = match (outcome, current) {
            (Some(true), _) => ProgressStage::Done,
            (Some(false), _) => ProgressStage::Failed,
            (None, None) => ProgressStage::Done,
            (None, Some(_)) if !started => ProgressStage::Idle,
            (None, Some(StepKind::Initialize)) => ProgressStage::Initializing,
            (None, Some(StepKind::Transfer { .. })) => ProgressStage::Transferring,
            (None, Some(StepKind::Cutover)) => ProgressStage::CuttingOver,
        };

        let progress = record.state.progress.as_ref();
        Ok(ProgressStatus {
            job_id: record.job_id.clone(),
            stage,
            step: current.map(|s| s.to_string()),
            table: current.and_then(|s| s.table()).map(str::to_string),
            offset: progress.map(|p| p.offset).unwrap_or(0),
            total: progress.map(|p| p.total).unwrap_or(0),
            fraction: progress.map(|p| p.fraction).unwrap_or(0.0),
            rows_committed,
            errors: record.state.results.errors.clone(),
            last_update: record.updated_at,
        })
    }
}
