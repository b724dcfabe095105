use model::execution::{state::JobResults, step::Operation};
use tracing::{error, info, warn};

pub const SUCCESS_MESSAGE: &str = "The database was synchronized successfully.";
pub const PARTIAL_MESSAGE: &str = "The database was synchronized with errors.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Synchronized,
    SynchronizedWithErrors,
    Failed,
}

/// Final report of a job, produced once the step-runner stops.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishReport {
    pub success: bool,
    pub messages: Vec<String>,
    pub errors: Vec<String>,
    /// Operations that never completed, in plan order.
    pub remaining: Vec<Operation>,
}

/// Builds the report for a job that stopped with `success`.
pub fn finish(success: bool, results: &JobResults, remaining: &[Operation]) -> FinishReport {
    FinishReport {
        success,
        messages: results.messages.clone(),
        errors: results.errors.clone(),
        remaining: remaining.to_vec(),
    }
}

impl FinishReport {
    pub fn outcome(&self) -> Outcome {
        match (self.success, self.errors.is_empty()) {
            (false, _) => Outcome::Failed,
            (true, true) => Outcome::Synchronized,
            (true, false) => Outcome::SynchronizedWithErrors,
        }
    }

    /// The first operation that was not processed, rendered for an operator.
    pub fn failed_operation(&self) -> Option<String> {
        self.remaining.first().map(|op| {
            format!(
                "An error occurred while processing {} with arguments: {}",
                op.step,
                serde_json::to_string(&op.options).unwrap_or_default()
            )
        })
    }

    pub fn log(&self) {
        for message in &self.messages {
            info!("{}", message);
        }

        match self.outcome() {
            Outcome::Synchronized => info!("{}", SUCCESS_MESSAGE),
            Outcome::SynchronizedWithErrors => {
                for err in &self.errors {
                    error!("{}", err);
                }
                warn!("{}", PARTIAL_MESSAGE);
            }
            Outcome::Failed => {
                for err in &self.errors {
                    error!("{}", err);
                }
                match self.failed_operation() {
                    Some(line) => error!("{}", line),
                    None => error!("The synchronization failed."),
                }
            }
        }
    }
}
