use crate::sql::{
    base::{
        adapter::{DatabaseKind, SqlAdapter},
        dialect::MySql,
        error::{ConnectorError, DbError},
        query::generator::QueryGenerator,
        requests::FetchRowsRequest,
    },
    mysql::params::{MySqlParamStore, to_value},
};
use async_trait::async_trait;
use model::records::row::{FieldValue, RowData};
use mysql_async::{Opts, Pool, Row, TxOpts, Value as MySqlValue, prelude::*};
use tracing::{debug, info};

#[derive(Clone)]
pub struct MySqlAdapter {
    pool: Pool,
    dialect: MySql,
}

const QUERY_TABLE_EXISTS_SQL: &str = include_str!("sql/table_exists.sql");
const QUERY_PRIMARY_KEY_SQL: &str = include_str!("sql/primary_key.sql");
const QUERY_TABLE_COLUMNS_SQL: &str = include_str!("sql/table_columns.sql");
const ALLOW_INVALID_DATES_SQL: &str = include_str!("sql/allow_invalid_dates.sql");

/// Rows per INSERT statement; keeps packets well below `max_allowed_packet`.
const INSERT_BATCH_ROWS: usize = 500;

impl MySqlAdapter {
    fn generator(&self) -> QueryGenerator<'_> {
        QueryGenerator::new(&self.dialect)
    }

    fn to_row_data(table: &str, mut row: Row) -> RowData {
        let names: Vec<String> = row
            .columns_ref()
            .iter()
            .map(|col| col.name_str().into_owned())
            .collect();

        let field_values = names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| {
                let value = row.take::<MySqlValue, _>(idx).unwrap_or(MySqlValue::NULL);
                FieldValue {
                    name,
                    value: to_value(value),
                }
            })
            .collect();

        RowData::new(table, field_values)
    }
}

#[async_trait]
impl SqlAdapter for MySqlAdapter {
    async fn connect(url: &str) -> Result<Self, ConnectorError> {
        let opts = Opts::from_url(url).map_err(|e| ConnectorError::InvalidUrl(e.to_string()))?;
        let pool = Pool::new(opts);

        // fail fast on unreachable servers instead of on the first step
        let conn = pool.get_conn().await?;
        drop(conn);

        Ok(MySqlAdapter {
            pool,
            dialect: MySql,
        })
    }

    async fn exec(&self, query: &str) -> Result<(), DbError> {
        let mut conn = self.pool.get_conn().await?;
        conn.query_drop(query).await?;
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        let mut conn = self.pool.get_conn().await?;
        let count: Option<i64> = conn.exec_first(QUERY_TABLE_EXISTS_SQL, (table,)).await?;
        Ok(count.unwrap_or(0) > 0)
    }

    async fn create_statement(&self, table: &str) -> Result<String, DbError> {
        let mut conn = self.pool.get_conn().await?;
        let row: Option<(String, String)> =
            conn.query_first(self.generator().show_create(table)).await?;
        row.map(|(_, ddl)| ddl)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))
    }

    async fn primary_key(&self, table: &str) -> Result<Vec<String>, DbError> {
        let mut conn = self.pool.get_conn().await?;
        let columns: Vec<String> = conn.exec(QUERY_PRIMARY_KEY_SQL, (table,)).await?;
        Ok(columns)
    }

    async fn columns(&self, table: &str) -> Result<Vec<String>, DbError> {
        let mut conn = self.pool.get_conn().await?;
        let columns: Vec<String> = conn.exec(QUERY_TABLE_COLUMNS_SQL, (table,)).await?;
        Ok(columns)
    }

    async fn row_count(&self, table: &str) -> Result<u64, DbError> {
        let mut conn = self.pool.get_conn().await?;
        let count: Option<u64> = conn.query_first(self.generator().count(table)).await?;
        Ok(count.unwrap_or(0))
    }

    async fn fetch_rows(&self, request: FetchRowsRequest) -> Result<Vec<RowData>, DbError> {
        let sql = self.generator().select(&request);
        debug!("Generated SQL: {}", sql);

        let mut conn = self.pool.get_conn().await?;
        let rows: Vec<Row> = conn.query(sql).await?;

        Ok(rows
            .into_iter()
            .map(|row| Self::to_row_data(&request.table, row))
            .collect())
    }

    async fn insert_rows(&self, table: &str, rows: &[RowData]) -> Result<u64, DbError> {
        let Some(first) = rows.first() else {
            return Ok(0);
        };
        let columns = first.columns();

        let mut conn = self.pool.get_conn().await?;
        conn.query_drop(ALLOW_INVALID_DATES_SQL).await?;

        let mut tx = conn.start_transaction(TxOpts::default()).await?;
        for batch in rows.chunks(INSERT_BATCH_ROWS) {
            if let Some(row) = batch.iter().find(|r| r.field_values.len() != columns.len()) {
                return Err(DbError::Write(format!(
                    "row of `{}` has {} values, expected {}",
                    row.entity,
                    row.field_values.len(),
                    columns.len()
                )));
            }

            let sql = self.generator().insert(table, &columns, batch.len());
            let params = MySqlParamStore::from_values(batch.iter().flat_map(|r| r.values()));
            tx.exec_drop(sql, params.params()).await?;
        }
        tx.commit().await?;

        info!(table, rows = rows.len(), "Inserted rows");
        Ok(rows.len() as u64)
    }

    async fn rename_tables(&self, renames: &[(String, String)]) -> Result<(), DbError> {
        if renames.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.get_conn().await?;
        conn.query_drop(self.generator().rename(renames)).await?;
        Ok(())
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::MySql
    }
}
