use crate::{
    error::RunnerError,
    plan,
    report::{self, FinishReport},
    step::{StepOutcome, Synchronizer},
};
use chrono::Utc;
use engine_core::state::{
    StateStore,
    models::{JobRecord, WalEntry, options_hash},
};
use model::execution::options::SyncOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Step-runner that invokes the synchronizer until the job is done and
/// persists the job record after every invocation.
pub struct BatchRunner {
    synchronizer: Synchronizer,
    store: Arc<dyn StateStore>,
    cancel: CancellationToken,
}

impl BatchRunner {
    pub fn new(
        synchronizer: Synchronizer,
        store: Arc<dyn StateStore>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            synchronizer,
            store,
            cancel,
        }
    }

    /// Runs job `job_id`, resuming it when a record already exists.
    ///
    /// `options` only seeds a new job; a resumed job keeps the options it
    /// was planned with.
    pub async fn run(
        &self,
        job_id: &str,
        options: SyncOptions,
    ) -> Result<FinishReport, RunnerError> {
        let mut record = self.open(job_id, options).await?;
        if record.is_finished() {
            info!(job_id, "Job already finished");
            return Ok(report::finish(true, &record.state.results, &[]));
        }

        let total = record.operations.len();
        let mut started = None;

        while let Some(op) = record.current().cloned() {
            if self.cancel.is_cancelled() {
                warn!(job_id, step = %op.step, "Shutdown requested, progress saved");
                return Err(RunnerError::ShutdownRequested);
            }

            if started != Some(record.cursor) {
                info!(
                    "Processing step {}/{}: {}",
                    record.cursor + 1,
                    total,
                    op.step
                );
                self.store
                    .append_wal(&WalEntry::StepStart {
                        job_id: job_id.to_string(),
                        step: op.step.clone(),
                    })
                    .await?;
                started = Some(record.cursor);
            }

            let outcome = match self.synchronizer.step(&op, &mut record.state).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    record.state.record_error(err.to_string());
                    return self.fail(&mut record, &op.step, err.to_string()).await;
                }
            };

            self.log_outcome(job_id, &op.step, &outcome).await?;

            if outcome.abort {
                let error = outcome.error.unwrap_or_default();
                return self.fail(&mut record, &op.step, error).await;
            }

            if outcome.finished {
                self.store
                    .append_wal(&WalEntry::StepDone {
                        job_id: job_id.to_string(),
                        step: op.step.clone(),
                    })
                    .await?;
                record.cursor += 1;
            }

            record.updated_at = Utc::now();
            self.store.save_job(&record).await?;

            if let Some(delay) = outcome.retry_after {
                warn!(step = %op.step, ?delay, "Retrying chunk after backoff");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.cancel.cancelled() => {
                        warn!(job_id, "Shutdown requested during backoff, progress saved");
                        return Err(RunnerError::ShutdownRequested);
                    }
                }
            }
        }

        self.store
            .append_wal(&WalEntry::JobDone {
                job_id: job_id.to_string(),
                success: true,
            })
            .await?;

        info!(job_id, "Job completed");
        Ok(report::finish(true, &record.state.results, &[]))
    }

    async fn open(&self, job_id: &str, options: SyncOptions) -> Result<JobRecord, RunnerError> {
        if let Some(record) = self.store.load_job(job_id).await? {
            info!(job_id, cursor = record.cursor, "Resuming job");

            if let Some(planned) = record.operations.first() {
                let mut supplied = options;
                supplied.generation = planned.options.generation;
                if options_hash(&supplied)? != options_hash(&planned.options)? {
                    warn!(job_id, "Options differ from the ones the job was planned with, ignoring them");
                }
            }
            return Ok(record);
        }

        let record = JobRecord::new(job_id, plan::operations(&options));
        self.store
            .append_wal(&WalEntry::JobStart {
                job_id: job_id.to_string(),
                options_hash: options_hash(&options)?,
                at: Utc::now(),
            })
            .await?;
        self.store.save_job(&record).await?;

        info!(
            job_id,
            generation = options.generation,
            steps = record.operations.len(),
            "Started job"
        );
        Ok(record)
    }

    async fn log_outcome(
        &self,
        job_id: &str,
        step: &model::execution::step::StepKind,
        outcome: &StepOutcome,
    ) -> Result<(), RunnerError> {
        if let Some(message) = &outcome.message {
            info!(step = %step, fraction = outcome.fraction, "{}", message);
        }

        if let Some(chunk) = &outcome.chunk {
            self.store
                .append_wal(&WalEntry::ChunkCommit {
                    job_id: job_id.to_string(),
                    table: chunk.table.clone(),
                    offset: chunk.offset,
                    rows: chunk.rows,
                    at: Utc::now(),
                })
                .await?;
        }

        if let Some(error) = &outcome.error {
            self.store
                .append_wal(&WalEntry::StepFailed {
                    job_id: job_id.to_string(),
                    step: step.clone(),
                    error: error.clone(),
                })
                .await?;
        }

        Ok(())
    }

    /// Stops the job as failed; the report lists every unprocessed operation.
    async fn fail(
        &self,
        record: &mut JobRecord,
        step: &model::execution::step::StepKind,
        error: String,
    ) -> Result<FinishReport, RunnerError> {
        warn!(job_id = %record.job_id, step = %step, error = %error, "Job stopped");

        record.updated_at = Utc::now();
        self.store.save_job(record).await?;
        self.store
            .append_wal(&WalEntry::JobDone {
                job_id: record.job_id.clone(),
                success: false,
            })
            .await?;

        Ok(report::finish(
            false,
            &record.state.results,
            record.remaining(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Outcome;
    use connectors::{adapter::StoreRegistry, sql::memory::adapter::MemoryAdapter};
    use engine_core::state::sled_store::SledStateStore;
    use model::{
        execution::{
            options::{ChunkSize, CutoverMode, ErrorPolicy, TableSpec},
            step::StepKind,
        },
        records::row::{FieldValue, RowData},
    };
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};
    use tracing_test::traced_test;

    const GENERATION: i64 = 1_700_000_000;

    fn options(on_error: ErrorPolicy) -> SyncOptions {
        SyncOptions {
            source: "legacy".into(),
            destination: "fresh".into(),
            generation: GENERATION,
            tables: vec![TableSpec::new("orders", ChunkSize::Rows(100))],
            on_error,
            cutover: CutoverMode::PerTable,
            max_chunk_attempts: 3,
        }
    }

    async fn stores(rows: i64) -> (MemoryAdapter, MemoryAdapter) {
        let source = MemoryAdapter::new();
        let destination = MemoryAdapter::new();
        source
            .create_table("orders", &["id", "note"], &["id"])
            .await
            .unwrap();
        destination
            .create_table("orders", &["id", "note"], &["id"])
            .await
            .unwrap();
        source
            .insert_fixture(
                "orders",
                (1..=rows)
                    .map(|i| {
                        RowData::new(
                            "orders",
                            vec![FieldValue::new("id", i), FieldValue::new("note", "x")],
                        )
                    })
                    .collect(),
            )
            .await
            .unwrap();
        (source, destination)
    }

    fn registry(source: &MemoryAdapter, destination: &MemoryAdapter) -> StoreRegistry {
        let mut registry = StoreRegistry::new();
        registry.register("legacy", Arc::new(source.clone()));
        registry.register("fresh", Arc::new(destination.clone()));
        registry
    }

    fn runner(
        source: &MemoryAdapter,
        destination: &MemoryAdapter,
        cancel: CancellationToken,
    ) -> (TempDir, Arc<dyn StateStore>, BatchRunner) {
        let dir = tempdir().unwrap();
        let store: Arc<dyn StateStore> = Arc::new(SledStateStore::open(dir.path()).unwrap());
        let synchronizer = Synchronizer::new(registry(source, destination))
            .with_backoff(Duration::ZERO, Duration::ZERO);
        let runner = BatchRunner::new(synchronizer, store.clone(), cancel);
        (dir, store, runner)
    }

    #[traced_test]
    #[tokio::test]
    async fn runs_every_step_and_promotes_the_shadow() {
        let (source, destination) = stores(250).await;
        let (_dir, store, runner) = runner(&source, &destination, CancellationToken::new());

        let report = runner
            .run("job", options(ErrorPolicy::Continue))
            .await
            .unwrap();

        assert_eq!(report.outcome(), Outcome::Synchronized);
        assert_eq!(destination.rows("orders").await.len(), 250);
        assert_eq!(destination.table_names().await.len(), 2);
        assert!(logs_contain("Created 200 row(s) of 250 in orders_sync_1700000000"));

        let wal = store.iter_wal("job").await.unwrap();
        let chunks = wal
            .iter()
            .filter(|e| matches!(e, WalEntry::ChunkCommit { .. }))
            .count();
        assert_eq!(chunks, 3);
        assert!(matches!(
            wal.last(),
            Some(WalEntry::JobDone { success: true, .. })
        ));

        let again = runner
            .run("job", options(ErrorPolicy::Continue))
            .await
            .unwrap();
        assert!(again.success);
        assert_eq!(store.iter_wal("job").await.unwrap().len(), wal.len());
    }

    #[tokio::test]
    async fn retries_a_failed_chunk_and_keeps_the_error() {
        let (source, destination) = stores(250).await;
        destination
            .fail_next_inserts(&format!("orders_sync_{GENERATION}"), 1)
            .await;
        let (_dir, store, runner) = runner(&source, &destination, CancellationToken::new());

        let report = runner
            .run("job", options(ErrorPolicy::Continue))
            .await
            .unwrap();

        assert_eq!(report.outcome(), Outcome::SynchronizedWithErrors);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(destination.rows("orders").await.len(), 250);

        let failed = store
            .iter_wal("job")
            .await
            .unwrap()
            .into_iter()
            .filter(|e| matches!(e, WalEntry::StepFailed { .. }))
            .count();
        assert_eq!(failed, 1);
    }

    #[tokio::test]
    async fn abort_policy_stops_at_the_failed_step() {
        let (source, destination) = stores(50).await;
        destination
            .fail_next_inserts(&format!("orders_sync_{GENERATION}"), 1)
            .await;
        let (_dir, store, runner) = runner(&source, &destination, CancellationToken::new());

        let report = runner
            .run("job", options(ErrorPolicy::Abort))
            .await
            .unwrap();

        assert_eq!(report.outcome(), Outcome::Failed);
        assert_eq!(
            report.remaining.first().map(|op| &op.step),
            Some(&StepKind::Transfer {
                table: "orders".into()
            })
        );
        assert!(destination.rows("orders").await.is_empty());

        let record = store.load_job("job").await.unwrap().unwrap();
        assert_eq!(record.cursor, 1);
        assert!(matches!(
            store.iter_wal("job").await.unwrap().last(),
            Some(WalEntry::JobDone { success: false, .. })
        ));
    }

    #[tokio::test]
    async fn cancelled_job_resumes_where_it_stopped() {
        let (source, destination) = stores(30).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (dir, store, runner) = runner(&source, &destination, cancel);

        let err = runner
            .run("job", options(ErrorPolicy::Continue))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::ShutdownRequested));
        assert_eq!(store.load_job("job").await.unwrap().unwrap().cursor, 0);

        let resumed = BatchRunner::new(
            Synchronizer::new(registry(&source, &destination)),
            store,
            CancellationToken::new(),
        );
        let report = resumed
            .run("job", options(ErrorPolicy::Continue))
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(destination.rows("orders").await.len(), 30);
        drop(dir);
    }

    #[tokio::test]
    async fn resumed_job_keeps_the_stores_it_started_with() {
        let (source, destination) = stores(30).await;
        let (other, _) = stores(150).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (_dir, store, runner) = runner(&source, &destination, cancel);
        runner
            .run("job", options(ErrorPolicy::Continue))
            .await
            .unwrap_err();

        let mut registered = registry(&source, &destination);
        registered.register("other", Arc::new(other.clone()));
        let resumed =
            BatchRunner::new(Synchronizer::new(registered), store, CancellationToken::new());

        let mut moved = options(ErrorPolicy::Continue);
        moved.source = "other".into();
        let report = resumed.run("job", moved).await.unwrap();

        assert!(report.success);
        assert_eq!(destination.rows("orders").await.len(), 30);
        assert_eq!(other.table_names().await, vec!["orders"]);
    }

    #[tokio::test]
    async fn resumed_job_fails_when_its_store_is_gone() {
        let (source, destination) = stores(30).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (_dir, store, runner) = runner(&source, &destination, cancel);
        runner
            .run("job", options(ErrorPolicy::Continue))
            .await
            .unwrap_err();

        let mut registered = StoreRegistry::new();
        registered.register("other", Arc::new(source.clone()));
        registered.register("fresh", Arc::new(destination.clone()));
        let resumed =
            BatchRunner::new(Synchronizer::new(registered), store, CancellationToken::new());

        let mut moved = options(ErrorPolicy::Continue);
        moved.source = "other".into();
        let report = resumed.run("job", moved).await.unwrap();

        assert_eq!(report.outcome(), Outcome::Failed);
        assert!(report.errors.iter().any(|e| e.contains("Unknown store: legacy")));
        assert_eq!(destination.table_names().await, vec!["orders"]);
    }
}
