use crate::execution::options::SyncOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of steps a synchronization job is made of.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Create every shadow table in the destination.
    Initialize,
    /// Copy one table into its shadow, chunk by chunk.
    Transfer { table: String },
    /// Back up the live tables and promote the shadows.
    Cutover,
}

impl StepKind {
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Initialize => "initialize",
            StepKind::Transfer { .. } => "transfer",
            StepKind::Cutover => "cutover",
        }
    }

    pub fn table(&self) -> Option<&str> {
        match self {
            StepKind::Transfer { table } => Some(table),
            _ => None,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Transfer { table } => write!(f, "transfer({table})"),
            other => f.write_str(other.name()),
        }
    }
}

/// One entry of the job description handed to the step-runner.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Operation {
    pub step: StepKind,
    /// Snapshot of the options at the time the job was planned.
    pub options: SyncOptions,
}

impl Operation {
    pub fn new(step: StepKind, options: SyncOptions) -> Self {
        Operation { step, options }
    }
}
