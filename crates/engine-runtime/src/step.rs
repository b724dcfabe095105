use chrono::Utc;
use connectors::adapter::StoreRegistry;
use engine_core::{
    breaker::{BreakerState, ChunkBreaker},
    context::SyncContext,
    cutover::CutoverManager,
    error::SyncError,
    schema::replicate_table,
    transfer::RowTransfer,
};
use model::{
    core::identifiers::SHADOW_INFIX,
    execution::{
        options::SyncOptions,
        state::{JobState, ProgressState},
        step::{Operation, StepKind},
    },
};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Rows committed by one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedChunk {
    pub table: String,
    pub offset: u64,
    pub rows: u64,
}

/// What one invocation of a step reports back to the step-runner.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepOutcome {
    /// The step is done; the runner moves on to the next operation.
    pub finished: bool,
    pub fraction: f64,
    pub message: Option<String>,
    /// Error raised and recorded by this invocation.
    pub error: Option<String>,
    /// The error policy asks for the whole job to stop here.
    pub abort: bool,
    /// Wait this long before invoking the same step again.
    pub retry_after: Option<Duration>,
    pub chunk: Option<CommittedChunk>,
}

impl StepOutcome {
    fn done(message: Option<String>) -> Self {
        StepOutcome {
            finished: true,
            fraction: 1.0,
            message,
            ..Default::default()
        }
    }
}

/// Runs one invocation of a synchronization step.
///
/// Store handles are resolved from the job's captured options on every
/// invocation, so a resumed job keeps working against the stores it
/// started with.
pub struct Synchronizer {
    registry: StoreRegistry,
    base_delay: Duration,
    max_delay: Duration,
}

impl Synchronizer {
    pub fn new(registry: StoreRegistry) -> Self {
        Self {
            registry,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// Backoff between retries of a failed chunk.
    pub fn with_backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Executes one invocation of `op`, updating `state` in place.
    ///
    /// Step failures are recorded in `state` and reported through the
    /// outcome. `Err` is reserved for a job that cannot continue at all,
    /// such as a captured store id that is no longer registered.
    pub async fn step(
        &self,
        op: &Operation,
        state: &mut JobState,
    ) -> Result<StepOutcome, SyncError> {
        if state.capture_options(&op.options) {
            warn!(
                step = %op.step,
                "Ignoring options that differ from the ones captured at job start"
            );
        }
        let options = state.options.clone().ok_or(SyncError::MissingOptions)?;

        if state.is_completed(&op.step) {
            debug!(step = %op.step, "Step already completed");
            return Ok(StepOutcome::done(None));
        }

        let ctx = SyncContext::from_registry(&self.registry, &options)?;

        match &op.step {
            StepKind::Initialize => Ok(self.initialize(&ctx, &options, state).await),
            StepKind::Transfer { table } => self.transfer(&ctx, &options, table, state).await,
            StepKind::Cutover => Ok(self.cutover(&ctx, &options, state).await),
        }
    }

    /// Creates the shadow table of every configured table.
    ///
    /// Shadows created by an earlier, aborted invocation are kept. A table
    /// that fails under the abort policy is tried again on the next one.
    async fn initialize(
        &self,
        ctx: &SyncContext,
        options: &SyncOptions,
        state: &mut JobState,
    ) -> StepOutcome {
        let mut first_error = None;

        for spec in &options.tables {
            let table = spec.name.as_str();
            if state.has_shadow(table) || state.is_table_failed(table) {
                continue;
            }

            let shadow = options.shadow_name(table);
            let created = replicate_table(
                ctx.source.as_ref(),
                ctx.destination.as_ref(),
                table,
                &shadow,
            )
            .await;

            match created {
                Ok(()) => state.record_shadow(table),
                Err(err) => {
                    let message = SyncError::from(err).to_string();
                    error!(table, error = %message, "Failed to create shadow table");
                    state.record_error(message.clone());

                    if options.aborts_on_error() {
                        return StepOutcome {
                            error: Some(message),
                            abort: true,
                            ..Default::default()
                        };
                    }
                    state.mark_table_failed(table);
                    first_error.get_or_insert(message);
                }
            }
        }

        let message = format!(
            "Created tables in {} with suffix '{}{}'",
            options.destination, SHADOW_INFIX, options.generation
        );
        info!("{}", message);
        state.record_message(message.clone());
        state.complete(StepKind::Initialize);

        StepOutcome {
            error: first_error,
            ..StepOutcome::done(Some(message))
        }
    }

    /// Copies the next chunk of `table` into its shadow.
    async fn transfer(
        &self,
        ctx: &SyncContext,
        options: &SyncOptions,
        table: &str,
        state: &mut JobState,
    ) -> Result<StepOutcome, SyncError> {
        let step = StepKind::Transfer {
            table: table.to_string(),
        };
        let spec = options
            .table(table)
            .ok_or_else(|| SyncError::UnknownTable(table.to_string()))?;

        if state.is_table_failed(table) {
            warn!(table, "Skipping transfer, shadow table is not usable");
            state.complete(step);
            return Ok(StepOutcome::done(None));
        }

        let shadow = options.shadow_name(table);
        let transfer = RowTransfer::new(ctx.source.clone(), ctx.destination.clone());

        let mut progress = match state.progress.take() {
            Some(p) if p.table == table => p,
            _ => ProgressState::new(table),
        };

        if !progress.prepared {
            match transfer.snapshot(table).await {
                Ok(snapshot) => {
                    info!(table, total = snapshot.total, "Starting table transfer");
                    progress.prepare(snapshot.total, snapshot.order_by);
                }
                Err(err) => {
                    return Ok(self.chunk_failed(options, step, progress, state, err.into()))
                }
            }
        }

        match transfer.committed(&shadow).await {
            Ok(committed) => {
                let skipped = progress.reconcile(committed);
                if skipped > 0 {
                    warn!(
                        table,
                        skipped,
                        offset = progress.offset,
                        "Shadow table holds rows past the saved offset, resuming after them"
                    );
                }
            }
            Err(err) => return Ok(self.chunk_failed(options, step, progress, state, err.into())),
        }

        let offset = progress.offset;
        let window = spec.chunk_size.window(progress.remaining());
        let rows = match transfer
            .transfer(table, &shadow, &progress.order_by, offset, window)
            .await
        {
            Ok(rows) => rows,
            Err(err) => return Ok(self.chunk_failed(options, step, progress, state, err.into())),
        };

        if rows < window {
            warn!(
                table,
                offset,
                expected = window,
                rows,
                "Source returned fewer rows than sampled, finishing table"
            );
        }

        let fraction = progress.record_chunk(window, rows);
        let message = format!(
            "Created {} row(s) of {} in {}",
            progress.offset, progress.total, shadow
        );
        let chunk = (rows > 0).then(|| CommittedChunk {
            table: table.to_string(),
            offset,
            rows,
        });

        if progress.is_finished() {
            info!(table, rows = progress.offset, "Table transfer complete");
            state.complete(step);
        } else {
            state.progress = Some(progress);
        }

        Ok(StepOutcome {
            finished: fraction >= 1.0,
            fraction,
            message: Some(message),
            chunk,
            ..Default::default()
        })
    }

    /// Records a failed chunk and decides between retrying, giving up on the
    /// table, or stopping the job.
    fn chunk_failed(
        &self,
        options: &SyncOptions,
        step: StepKind,
        mut progress: ProgressState,
        state: &mut JobState,
        err: SyncError,
    ) -> StepOutcome {
        let message = err.to_string();
        error!(step = %step, offset = progress.offset, error = %message, "Chunk failed");
        state.record_error(message.clone());

        if options.aborts_on_error() {
            state.progress = Some(progress);
            return StepOutcome {
                fraction: 0.0,
                error: Some(message),
                abort: true,
                ..Default::default()
            };
        }

        let mut breaker =
            ChunkBreaker::new(options.max_chunk_attempts, self.base_delay, self.max_delay)
                .resume(progress.failures);

        match breaker.record_failure() {
            BreakerState::RetryAfter(delay) => {
                progress.failures = breaker.failures();
                let fraction = progress.fraction;
                state.progress = Some(progress);
                StepOutcome {
                    fraction,
                    error: Some(message),
                    retry_after: Some(delay),
                    ..Default::default()
                }
            }
            BreakerState::Open => {
                let table = progress.table.clone();
                warn!(
                    table = %table,
                    attempts = breaker.failures(),
                    "Giving up on table, it will not be cut over"
                );
                state.mark_table_failed(&table);
                state.complete(step);
                StepOutcome {
                    finished: true,
                    fraction: 1.0,
                    error: Some(message),
                    ..Default::default()
                }
            }
        }
    }

    /// Backs up live tables and promotes every usable shadow.
    async fn cutover(
        &self,
        ctx: &SyncContext,
        options: &SyncOptions,
        state: &mut JobState,
    ) -> StepOutcome {
        let (tables, skipped): (Vec<String>, Vec<String>) = options
            .table_names()
            .into_iter()
            .partition(|t| !state.is_table_failed(t));

        for table in &skipped {
            warn!(table = %table, "Not cutting over table with failed synchronization");
        }

        let manager = CutoverManager::new(ctx.destination.clone(), options.cutover)
            .stop_on_error(options.aborts_on_error());
        let report = manager
            .cutover(&tables, options.generation, Utc::now())
            .await;

        for promoted in &report.promoted {
            match &promoted.backup {
                Some(backup) => state.record_message(format!("Created back up in {backup}")),
                None => state.record_message(format!(
                    "Promoted {} without backup, no live table existed",
                    promoted.shadow
                )),
            }
        }

        let active: Vec<&str> = report
            .promoted
            .iter()
            .map(|p| p.table.as_str())
            .chain(report.already_promoted.iter().map(String::as_str))
            .collect();
        let message = (!active.is_empty())
            .then(|| format!("New tables are now active: {}", active.join(",")));
        if let Some(message) = &message {
            info!("{}", message);
            state.record_message(message.clone());
        }

        let errors: Vec<String> = report
            .errors
            .into_iter()
            .map(|e| SyncError::from(e).to_string())
            .collect();
        for err in &errors {
            state.record_error(err.clone());
        }

        if !errors.is_empty() && options.aborts_on_error() {
            return StepOutcome {
                error: errors.first().cloned(),
                abort: true,
                ..Default::default()
            };
        }

        state.complete(StepKind::Cutover);
        StepOutcome {
            error: errors.first().cloned(),
            ..StepOutcome::done(message)
        }
    }
}
