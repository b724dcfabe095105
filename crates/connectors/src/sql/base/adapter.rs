use crate::sql::base::{
    error::{ConnectorError, DbError},
    requests::FetchRowsRequest,
};
use async_trait::async_trait;
use model::records::row::RowData;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseKind {
    MySql,
    Memory,
    Other(String),
}

impl DatabaseKind {
    pub fn from_url(url: &str) -> Self {
        let scheme = url.split("://").next().unwrap_or_default();
        match scheme.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => DatabaseKind::MySql,
            "memory" => DatabaseKind::Memory,
            other => DatabaseKind::Other(other.to_string()),
        }
    }
}

/// Narrow capability interface the synchronization engine needs from a store.
///
/// Every call is made on an explicit handle; there is no notion of an
/// "active" connection that callers have to select first.
#[async_trait]
pub trait SqlAdapter: Send + Sync {
    async fn connect(url: &str) -> Result<Self, ConnectorError>
    where
        Self: Sized;

    async fn exec(&self, query: &str) -> Result<(), DbError>;

    // Introspection
    async fn table_exists(&self, table: &str) -> Result<bool, DbError>;
    /// Creation statement of `table` as reported by the store.
    async fn create_statement(&self, table: &str) -> Result<String, DbError>;
    /// Primary key columns in key order; empty when the table has none.
    async fn primary_key(&self, table: &str) -> Result<Vec<String>, DbError>;
    /// All columns in ordinal order.
    async fn columns(&self, table: &str) -> Result<Vec<String>, DbError>;
    async fn row_count(&self, table: &str) -> Result<u64, DbError>;

    // Data
    async fn fetch_rows(&self, request: FetchRowsRequest) -> Result<Vec<RowData>, DbError>;
    /// Inserts `rows` as one unit of work and returns how many were written.
    ///
    /// Either every row is committed or none is. The session accepts legacy
    /// invalid dates since the source data is not revalidated.
    async fn insert_rows(&self, table: &str, rows: &[RowData]) -> Result<u64, DbError>;

    /// Applies every `(from, to)` rename as a single atomic operation.
    async fn rename_tables(&self, renames: &[(String, String)]) -> Result<(), DbError>;

    fn kind(&self) -> DatabaseKind;
}
