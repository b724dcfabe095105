use crate::error::TransferError;
use connectors::sql::base::{
    adapter::SqlAdapter, error::DbError, requests::FetchRowsRequestBuilder,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Row count and ordering key sampled once before the first chunk of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSnapshot {
    pub total: u64,
    pub order_by: Vec<String>,
}

/// Copies windows of rows from a source table into its shadow.
pub struct RowTransfer {
    source: Arc<dyn SqlAdapter>,
    destination: Arc<dyn SqlAdapter>,
}

impl RowTransfer {
    pub fn new(source: Arc<dyn SqlAdapter>, destination: Arc<dyn SqlAdapter>) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Samples the row count of `table` and picks the columns that give its
    /// rows a stable order: the primary key, or every column when it has none.
    pub async fn snapshot(&self, table: &str) -> Result<TableSnapshot, TransferError> {
        let total = self
            .source
            .row_count(table)
            .await
            .map_err(|source| TransferError::Count {
                table: table.to_string(),
                source,
            })?;

        let ordering = |source: DbError| TransferError::OrderingKey {
            table: table.to_string(),
            source,
        };
        let mut order_by = self.source.primary_key(table).await.map_err(ordering)?;
        if order_by.is_empty() {
            order_by = self.source.columns(table).await.map_err(ordering)?;
        }

        debug!(table, total, order_by = ?order_by, "Sampled table");
        Ok(TableSnapshot { total, order_by })
    }

    /// Rows already committed to `shadow`. Chunks are inserted atomically,
    /// so this is the offset the next chunk must start from.
    pub async fn committed(&self, shadow: &str) -> Result<u64, TransferError> {
        self.destination
            .row_count(shadow)
            .await
            .map_err(|source| TransferError::Count {
                table: shadow.to_string(),
                source,
            })
    }

    /// Copies at most `limit` rows starting at `offset` and returns how many
    /// were written. The insert is all-or-nothing.
    pub async fn transfer(
        &self,
        table: &str,
        shadow: &str,
        order_by: &[String],
        offset: u64,
        limit: u64,
    ) -> Result<u64, TransferError> {
        if limit == 0 {
            return Ok(0);
        }

        let request = FetchRowsRequestBuilder::new(table.to_string())
            .order_by(order_by.to_vec())
            .offset(offset)
            .limit(Some(limit))
            .build();

        let rows = self
            .source
            .fetch_rows(request)
            .await
            .map_err(|source| TransferError::Fetch {
                table: table.to_string(),
                offset,
                source,
            })?;

        if rows.is_empty() {
            return Ok(0);
        }

        let written = self
            .destination
            .insert_rows(shadow, &rows)
            .await
            .map_err(|source| TransferError::Insert {
                table: shadow.to_string(),
                offset,
                end: offset + rows.len() as u64,
                source,
            })?;

        info!(table, shadow, offset, rows = written, "Transferred chunk");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::sql::memory::adapter::MemoryAdapter;
    use model::{
        core::value::Value,
        records::row::{FieldValue, RowData},
    };

    async fn setup(rows: i64, key: &[&str]) -> (MemoryAdapter, MemoryAdapter, RowTransfer) {
        let source = MemoryAdapter::new();
        let destination = MemoryAdapter::new();
        source.create_table("t", &["id", "v"], key).await.unwrap();
        destination
            .create_table("t_sync_1", &["id", "v"], key)
            .await
            .unwrap();
        source
            .insert_fixture(
                "t",
                (1..=rows)
                    .rev()
                    .map(|i| {
                        RowData::new(
                            "t",
                            vec![FieldValue::new("id", i), FieldValue::new("v", format!("r{i}"))],
                        )
                    })
                    .collect(),
            )
            .await
            .unwrap();

        let transfer = RowTransfer::new(Arc::new(source.clone()), Arc::new(destination.clone()));
        (source, destination, transfer)
    }

    #[tokio::test]
    async fn snapshot_prefers_primary_key() {
        let (_, _, transfer) = setup(3, &["id"]).await;
        let snapshot = transfer.snapshot("t").await.unwrap();
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.order_by, vec!["id".to_string()]);
    }

    #[tokio::test]
    async fn snapshot_falls_back_to_all_columns() {
        let (_, _, transfer) = setup(3, &[]).await;
        let snapshot = transfer.snapshot("t").await.unwrap();
        assert_eq!(snapshot.order_by, vec!["id".to_string(), "v".to_string()]);
    }

    #[tokio::test]
    async fn consecutive_windows_cover_the_table_once() {
        let (_, destination, transfer) = setup(5, &["id"]).await;
        let order = vec!["id".to_string()];

        assert_eq!(transfer.transfer("t", "t_sync_1", &order, 0, 2).await.unwrap(), 2);
        assert_eq!(transfer.transfer("t", "t_sync_1", &order, 2, 2).await.unwrap(), 2);
        assert_eq!(transfer.transfer("t", "t_sync_1", &order, 4, 2).await.unwrap(), 1);
        assert_eq!(transfer.transfer("t", "t_sync_1", &order, 5, 2).await.unwrap(), 0);

        let ids: Vec<Value> = destination
            .rows("t_sync_1")
            .await
            .iter()
            .map(|r| r.get_value("id"))
            .collect();
        assert_eq!(ids, (1..=5).map(Value::Int).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn committed_counts_the_shadow() {
        let (_, _, transfer) = setup(5, &["id"]).await;
        let order = vec!["id".to_string()];
        assert_eq!(transfer.committed("t_sync_1").await.unwrap(), 0);

        transfer.transfer("t", "t_sync_1", &order, 0, 3).await.unwrap();
        assert_eq!(transfer.committed("t_sync_1").await.unwrap(), 3);

        let err = transfer.committed("missing").await.unwrap_err();
        assert!(matches!(err, TransferError::Count { table, .. } if table == "missing"));
    }

    #[tokio::test]
    async fn failed_insert_reports_window() {
        let (_, destination, transfer) = setup(5, &["id"]).await;
        destination.fail_next_inserts("t_sync_1", 1).await;

        let err = transfer
            .transfer("t", "t_sync_1", &["id".to_string()], 2, 2)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::Insert { offset: 2, end: 4, .. }
        ));
        assert!(destination.rows("t_sync_1").await.is_empty());
    }
}
