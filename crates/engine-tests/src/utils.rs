#![allow(dead_code)]

use connectors::{adapter::StoreRegistry, sql::memory::adapter::MemoryAdapter};
use engine_core::state::{StateStore, sled_store::SledStateStore};
use engine_runtime::{
    plan,
    runner::BatchRunner,
    step::{StepOutcome, Synchronizer},
};
use model::{
    execution::{
        options::{ChunkSize, CutoverMode, ErrorPolicy, SyncOptions, TableSpec},
        state::JobState,
        step::{Operation, StepKind},
    },
    records::row::{FieldValue, RowData},
};
use std::{sync::Arc, time::Duration};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub const GENERATION: i64 = 1_700_000_000;
pub const SOURCE: &str = "legacy";
pub const DESTINATION: &str = "fresh";

/// `orders` rows with ids `1..=count`, inserted in reverse so that only the
/// ordering key gives them a stable order.
pub fn order_rows(table: &str, count: i64) -> Vec<RowData> {
    (1..=count)
        .rev()
        .map(|id| {
            RowData::new(
                table,
                vec![
                    FieldValue::new("id", id),
                    FieldValue::new("customer", format!("customer-{}", id % 7)),
                    FieldValue::new("status", "paid"),
                ],
            )
        })
        .collect()
}

pub fn options(tables: &[(&str, ChunkSize)]) -> SyncOptions {
    SyncOptions {
        source: SOURCE.into(),
        destination: DESTINATION.into(),
        generation: GENERATION,
        tables: tables
            .iter()
            .map(|(name, size)| TableSpec::new(*name, *size))
            .collect(),
        on_error: ErrorPolicy::Continue,
        cutover: CutoverMode::PerTable,
        max_chunk_attempts: 3,
    }
}

pub fn shadow(table: &str) -> String {
    format!("{table}_sync_{GENERATION}")
}

pub fn transfer(table: &str) -> StepKind {
    StepKind::Transfer {
        table: table.to_string(),
    }
}

/// A source and a destination store, each holding the same tables.
pub struct Fixture {
    pub source: MemoryAdapter,
    pub destination: MemoryAdapter,
}

impl Fixture {
    /// Creates every table on both sides and fills the source copy.
    pub async fn new(tables: &[(&str, i64)]) -> Self {
        let source = MemoryAdapter::new();
        let destination = MemoryAdapter::new();

        for (table, rows) in tables {
            for store in [&source, &destination] {
                store
                    .create_table(table, &["id", "customer", "status"], &["id"])
                    .await
                    .expect("create table");
            }
            source
                .insert_fixture(table, order_rows(table, *rows))
                .await
                .expect("insert fixture");
        }

        Fixture {
            source,
            destination,
        }
    }

    /// Both stores registered under the ids `options` refers to.
    pub fn registry(&self) -> StoreRegistry {
        let mut registry = StoreRegistry::new();
        registry.register(SOURCE, Arc::new(self.source.clone()));
        registry.register(DESTINATION, Arc::new(self.destination.clone()));
        registry
    }

    /// Synchronizer that retries failed chunks without waiting.
    pub fn synchronizer(&self) -> Synchronizer {
        Synchronizer::new(self.registry()).with_backoff(Duration::ZERO, Duration::ZERO)
    }

    /// Runner over a fresh sled store; keep the directory alive for the test.
    pub fn runner(&self) -> (TempDir, Arc<dyn StateStore>, BatchRunner) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store: Arc<dyn StateStore> =
            Arc::new(SledStateStore::open(dir.path()).expect("open sled"));
        let runner = BatchRunner::new(self.synchronizer(), store.clone(), CancellationToken::new());
        (dir, store, runner)
    }

    pub async fn row_ids(&self, table: &str) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .destination
            .rows(table)
            .await
            .iter()
            .filter_map(|row| match row.get_value("id") {
                model::core::value::Value::Int(id) => Some(id),
                _ => None,
            })
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// Drives a job by hand: invokes the synchronizer step by step the way the
/// runner does, without persisting anything.
pub struct Driver {
    pub synchronizer: Synchronizer,
    pub operations: Vec<Operation>,
    pub state: JobState,
}

impl Driver {
    pub fn new(fixture: &Fixture, options: &SyncOptions) -> Self {
        Driver {
            synchronizer: fixture.synchronizer(),
            operations: plan::operations(options),
            state: JobState::default(),
        }
    }

    pub fn operation(&self, step: &StepKind) -> Operation {
        self.operations
            .iter()
            .find(|op| &op.step == step)
            .cloned()
            .expect("planned operation")
    }

    pub async fn step(&mut self, step: &StepKind) -> StepOutcome {
        let op = self.operation(step);
        self.synchronizer
            .step(&op, &mut self.state)
            .await
            .expect("step invocation")
    }

    /// Invokes `step` until it reports completion and returns every outcome.
    pub async fn until_finished(&mut self, step: &StepKind) -> Vec<StepOutcome> {
        let mut outcomes = Vec::new();
        loop {
            let outcome = self.step(step).await;
            let finished = outcome.finished;
            outcomes.push(outcome);
            if finished {
                return outcomes;
            }
        }
    }
}

pub async fn assert_tables(store: &MemoryAdapter, expected: &[&str]) {
    let mut expected: Vec<String> = expected.iter().map(|t| t.to_string()).collect();
    expected.sort();
    assert_eq!(store.table_names().await, expected);
}
