use crate::error::CutoverError;
use chrono::{DateTime, Utc};
use connectors::sql::base::{adapter::SqlAdapter, error::DbError};
use model::{
    core::identifiers::{backup_table_name, shadow_table_name},
    execution::options::CutoverMode,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of promoting one shadow table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCutover {
    pub table: String,
    pub shadow: String,
    /// `None` when the destination had no live table to back up.
    pub backup: Option<String>,
}

#[derive(Debug, Default)]
pub struct CutoverReport {
    pub promoted: Vec<TableCutover>,
    /// Tables whose shadow was already gone, i.e. promoted by an earlier attempt.
    pub already_promoted: Vec<String>,
    pub errors: Vec<CutoverError>,
}

impl CutoverReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Backs up live tables and promotes their shadows.
pub struct CutoverManager {
    destination: Arc<dyn SqlAdapter>,
    mode: CutoverMode,
    stop_on_error: bool,
}

impl CutoverManager {
    pub fn new(destination: Arc<dyn SqlAdapter>, mode: CutoverMode) -> Self {
        Self {
            destination,
            mode,
            stop_on_error: false,
        }
    }

    /// Skip the remaining tables after the first failed one.
    pub fn stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    /// Cuts over every table in `tables`; backups are tagged with `now`.
    pub async fn cutover(
        &self,
        tables: &[String],
        generation: i64,
        now: DateTime<Utc>,
    ) -> CutoverReport {
        match self.mode {
            CutoverMode::PerTable => self.cutover_per_table(tables, generation, now).await,
            CutoverMode::Atomic => self.cutover_atomic(tables, generation, now).await,
        }
    }

    async fn cutover_per_table(
        &self,
        tables: &[String],
        generation: i64,
        now: DateTime<Utc>,
    ) -> CutoverReport {
        let mut report = CutoverReport::default();

        for table in tables {
            let plan = match self.plan(table, generation, now).await {
                Ok(Some(plan)) => plan,
                Ok(None) => {
                    report.already_promoted.push(table.clone());
                    continue;
                }
                Err(err) => {
                    report.errors.push(err);
                    if self.stop_on_error {
                        break;
                    }
                    continue;
                }
            };

            // Backup and promotion go in one statement so the live name is
            // never missing in between.
            match self.destination.rename_tables(&renames(&plan)).await {
                Ok(()) => {
                    info!(table = %plan.table, backup = ?plan.backup, "Promoted shadow table");
                    report.promoted.push(plan);
                }
                Err(source) => {
                    warn!(table = %table, error = %source, "Cutover failed");
                    report.errors.push(CutoverError::Rename {
                        table: table.clone(),
                        source,
                    });
                    if self.stop_on_error {
                        break;
                    }
                }
            }
        }

        report
    }

    async fn cutover_atomic(
        &self,
        tables: &[String],
        generation: i64,
        now: DateTime<Utc>,
    ) -> CutoverReport {
        let mut report = CutoverReport::default();
        let mut plans = Vec::new();

        for table in tables {
            match self.plan(table, generation, now).await {
                Ok(Some(plan)) => plans.push(plan),
                Ok(None) => report.already_promoted.push(table.clone()),
                Err(err) => report.errors.push(err),
            }
        }

        if !report.errors.is_empty() || plans.is_empty() {
            return report;
        }

        let batch: Vec<(String, String)> = plans.iter().flat_map(renames).collect();
        match self.destination.rename_tables(&batch).await {
            Ok(()) => {
                info!(tables = plans.len(), "Promoted all shadow tables");
                report.promoted = plans;
            }
            Err(source) => {
                let names: Vec<&str> = plans.iter().map(|p| p.table.as_str()).collect();
                warn!(tables = ?names, error = %source, "Atomic cutover failed");
                report.errors.push(CutoverError::Batch {
                    tables: names.join(","),
                    source,
                });
            }
        }

        report
    }

    /// Works out the renames for `table`; `None` when its shadow is already gone.
    async fn plan(
        &self,
        table: &str,
        generation: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<TableCutover>, CutoverError> {
        let lookup = |source: DbError| CutoverError::Lookup {
            table: table.to_string(),
            source,
        };
        let shadow = shadow_table_name(table, generation);

        if !self.destination.table_exists(&shadow).await.map_err(lookup)? {
            return Ok(None);
        }

        let backup = if self.destination.table_exists(table).await.map_err(lookup)? {
            Some(backup_table_name(table, now))
        } else {
            None
        };

        Ok(Some(TableCutover {
            table: table.to_string(),
            shadow,
            backup,
        }))
    }
}

fn renames(plan: &TableCutover) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(2);
    if let Some(backup) = &plan.backup {
        pairs.push((plan.table.clone(), backup.clone()));
    }
    pairs.push((plan.shadow.clone(), plan.table.clone()));
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use connectors::sql::memory::adapter::MemoryAdapter;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
    }

    async fn destination(tables: &[&str]) -> MemoryAdapter {
        let db = MemoryAdapter::new();
        for t in tables {
            db.create_table(t, &["id"], &["id"]).await.unwrap();
            db.create_table(&shadow_table_name(t, 7), &["id"], &["id"])
                .await
                .unwrap();
        }
        db
    }

    fn names(tables: &[&str]) -> Vec<String> {
        tables.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn per_table_failure_leaves_other_tables_promoted() {
        let db = destination(&["a", "b"]).await;
        db.fail_renames_from("b").await;
        let manager = CutoverManager::new(Arc::new(db.clone()), CutoverMode::PerTable);

        let report = manager.cutover(&names(&["a", "b"]), 7, now()).await;

        assert_eq!(report.promoted.len(), 1);
        assert_eq!(
            report.promoted[0].backup.as_deref(),
            Some("a_20240301123000")
        );
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(&report.errors[0], CutoverError::Rename { table, .. } if table == "b"));
        assert_eq!(
            db.table_names().await,
            vec!["a", "a_20240301123000", "b", "b_sync_7"]
        );
    }

    #[tokio::test]
    async fn atomic_failure_changes_nothing() {
        let db = destination(&["a", "b"]).await;
        db.fail_renames_from("b").await;
        let manager = CutoverManager::new(Arc::new(db.clone()), CutoverMode::Atomic);

        let report = manager.cutover(&names(&["a", "b"]), 7, now()).await;

        assert!(report.promoted.is_empty());
        assert!(matches!(&report.errors[..], [CutoverError::Batch { tables, .. }] if tables == "a,b"));
        assert_eq!(db.table_names().await, vec!["a", "a_sync_7", "b", "b_sync_7"]);
    }

    #[tokio::test]
    async fn first_time_destination_promotes_without_backup() {
        let db = MemoryAdapter::new();
        db.create_table("a_sync_7", &["id"], &["id"]).await.unwrap();
        let manager = CutoverManager::new(Arc::new(db.clone()), CutoverMode::PerTable);

        let report = manager.cutover(&names(&["a"]), 7, now()).await;

        assert!(report.is_clean());
        assert_eq!(report.promoted[0].backup, None);
        assert_eq!(db.table_names().await, vec!["a"]);
    }

    #[tokio::test]
    async fn missing_shadow_counts_as_already_promoted() {
        let db = destination(&["a"]).await;
        let manager = CutoverManager::new(Arc::new(db.clone()), CutoverMode::PerTable);

        let first = manager.cutover(&names(&["a"]), 7, now()).await;
        assert_eq!(first.promoted.len(), 1);

        let second = manager.cutover(&names(&["a"]), 7, now()).await;
        assert!(second.is_clean());
        assert!(second.promoted.is_empty());
        assert_eq!(second.already_promoted, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn stop_on_error_skips_remaining_tables() {
        let db = destination(&["a", "b"]).await;
        db.fail_renames_from("a").await;
        let manager =
            CutoverManager::new(Arc::new(db.clone()), CutoverMode::PerTable).stop_on_error(true);

        let report = manager.cutover(&names(&["a", "b"]), 7, now()).await;

        assert_eq!(report.errors.len(), 1);
        assert!(report.promoted.is_empty());
        assert!(db.table_exists("b_sync_7").await.unwrap());
    }
}
