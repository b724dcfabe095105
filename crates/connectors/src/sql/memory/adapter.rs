use crate::sql::base::{
    adapter::{DatabaseKind, SqlAdapter},
    error::{ConnectorError, DbError},
    requests::FetchRowsRequest,
};
use async_trait::async_trait;
use model::records::row::RowData;
use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone)]
struct MemoryTable {
    /// Everything after `CREATE TABLE \`name\` `.
    body: String,
    columns: Vec<String>,
    primary_key: Vec<String>,
    rows: Vec<RowData>,
}

#[derive(Debug, Default)]
struct MemoryDb {
    tables: BTreeMap<String, MemoryTable>,
    insert_failures: HashMap<String, u32>,
    rename_failures: HashSet<String>,
}

/// Store kept entirely in process memory.
///
/// Understands the subset of MySQL the engine issues: `CREATE TABLE` in the
/// shape `SHOW CREATE TABLE` prints it and `DROP TABLE [IF EXISTS]`.
/// Inserts and renames are all-or-nothing, like their MySQL counterparts.
#[derive(Clone, Default)]
pub struct MemoryAdapter {
    db: Arc<Mutex<MemoryDb>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `name` with text columns and the given primary key.
    pub async fn create_table(
        &self,
        name: &str,
        columns: &[&str],
        primary_key: &[&str],
    ) -> Result<(), DbError> {
        let mut lines: Vec<String> = columns
            .iter()
            .map(|c| format!("  `{c}` varchar(255) DEFAULT NULL"))
            .collect();
        if !primary_key.is_empty() {
            let key = primary_key
                .iter()
                .map(|c| format!("`{c}`"))
                .collect::<Vec<_>>()
                .join(",");
            lines.push(format!("  PRIMARY KEY ({key})"));
        }
        let ddl = format!(
            "CREATE TABLE `{name}` (\n{}\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
            lines.join(",\n")
        );
        self.exec(&ddl).await
    }

    /// Loads rows without going through failure injection.
    pub async fn insert_fixture(&self, table: &str, rows: Vec<RowData>) -> Result<(), DbError> {
        let mut db = self.db.lock().await;
        let target = db
            .tables
            .get_mut(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))?;
        target.rows.extend(rows);
        Ok(())
    }

    pub async fn rows(&self, table: &str) -> Vec<RowData> {
        let db = self.db.lock().await;
        db.tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub async fn table_names(&self) -> Vec<String> {
        self.db.lock().await.tables.keys().cloned().collect()
    }

    /// The next `times` inserts into `table` fail without writing anything.
    pub async fn fail_next_inserts(&self, table: &str, times: u32) {
        self.db
            .lock()
            .await
            .insert_failures
            .insert(table.to_string(), times);
    }

    /// Any rename batch that moves `table` away is rejected.
    pub async fn fail_renames_from(&self, table: &str) {
        self.db
            .lock()
            .await
            .rename_failures
            .insert(table.to_string());
    }

    fn parse_create(ddl: &str) -> Result<(String, MemoryTable), DbError> {
        let rest = ddl
            .trim_start()
            .strip_prefix("CREATE TABLE ")
            .ok_or_else(|| DbError::QueryBuildError(format!("unsupported statement: {ddl}")))?;
        let (name, body) = split_identifier(rest)
            .ok_or_else(|| DbError::QueryBuildError(format!("missing table name: {ddl}")))?;

        let mut columns = Vec::new();
        let mut primary_key = Vec::new();
        for line in body.lines().map(str::trim) {
            if let Some(key) = line.strip_prefix("PRIMARY KEY (") {
                primary_key = backticked(key);
            } else if line.starts_with('`') {
                if let Some((column, _)) = split_identifier(line) {
                    columns.push(column);
                }
            }
        }

        Ok((
            name,
            MemoryTable {
                body: body.trim_start().to_string(),
                columns,
                primary_key,
                rows: Vec::new(),
            },
        ))
    }

    fn table<'a>(db: &'a MemoryDb, table: &str) -> Result<&'a MemoryTable, DbError> {
        db.tables
            .get(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))
    }
}

/// Splits a leading `` `name` `` off `input`, returning the name and the remainder.
fn split_identifier(input: &str) -> Option<(String, &str)> {
    let input = input.strip_prefix('`')?;
    let end = input.find('`')?;
    Some((input[..end].to_string(), &input[end + 1..]))
}

fn backticked(input: &str) -> Vec<String> {
    input
        .split('`')
        .skip(1)
        .step_by(2)
        .map(str::to_string)
        .collect()
}

fn compare_rows(a: &RowData, b: &RowData, order_by: &[String]) -> Ordering {
    order_by
        .iter()
        .map(|col| {
            a.get_value(col)
                .partial_cmp(&b.get_value(col))
                .unwrap_or(Ordering::Equal)
        })
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

#[async_trait]
impl SqlAdapter for MemoryAdapter {
    async fn connect(url: &str) -> Result<Self, ConnectorError> {
        match DatabaseKind::from_url(url) {
            DatabaseKind::Memory => Ok(Self::new()),
            _ => Err(ConnectorError::InvalidUrl(url.to_string())),
        }
    }

    async fn exec(&self, query: &str) -> Result<(), DbError> {
        let trimmed = query.trim();
        let mut db = self.db.lock().await;

        if let Some(rest) = trimmed.strip_prefix("DROP TABLE ") {
            let (if_exists, rest) = match rest.strip_prefix("IF EXISTS ") {
                Some(rest) => (true, rest),
                None => (false, rest),
            };
            let (name, _) = split_identifier(rest.trim())
                .ok_or_else(|| DbError::QueryBuildError(format!("missing table name: {query}")))?;
            return match db.tables.remove(&name) {
                Some(_) => Ok(()),
                None if if_exists => Ok(()),
                None => Err(DbError::TableNotFound(name)),
            };
        }

        let (name, table) = Self::parse_create(trimmed)?;
        if db.tables.contains_key(&name) {
            return Err(DbError::TableExists(name));
        }
        debug!(table = %name, "Created in-memory table");
        db.tables.insert(name, table);
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        Ok(self.db.lock().await.tables.contains_key(table))
    }

    async fn create_statement(&self, table: &str) -> Result<String, DbError> {
        let db = self.db.lock().await;
        let t = Self::table(&db, table)?;
        Ok(format!("CREATE TABLE `{table}` {}", t.body))
    }

    async fn primary_key(&self, table: &str) -> Result<Vec<String>, DbError> {
        let db = self.db.lock().await;
        Ok(Self::table(&db, table)?.primary_key.clone())
    }

    async fn columns(&self, table: &str) -> Result<Vec<String>, DbError> {
        let db = self.db.lock().await;
        Ok(Self::table(&db, table)?.columns.clone())
    }

    async fn row_count(&self, table: &str) -> Result<u64, DbError> {
        let db = self.db.lock().await;
        Ok(Self::table(&db, table)?.rows.len() as u64)
    }

    async fn fetch_rows(&self, request: FetchRowsRequest) -> Result<Vec<RowData>, DbError> {
        let db = self.db.lock().await;
        let mut rows = Self::table(&db, &request.table)?.rows.clone();
        rows.sort_by(|a, b| compare_rows(a, b, &request.order_by));

        let offset = usize::try_from(request.offset).unwrap_or(usize::MAX);
        let limit = request
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn insert_rows(&self, table: &str, rows: &[RowData]) -> Result<u64, DbError> {
        let mut db = self.db.lock().await;

        if let Some(remaining) = db.insert_failures.get_mut(table) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(DbError::Write(format!("insert into `{table}` was rejected")));
            }
        }

        let target = db
            .tables
            .get_mut(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))?;

        if let Some(unknown) = rows
            .iter()
            .flat_map(|r| r.field_values.iter())
            .find(|f| !target.columns.iter().any(|c| c.eq_ignore_ascii_case(&f.name)))
        {
            return Err(DbError::Write(format!(
                "unknown column `{}` in `{table}`",
                unknown.name
            )));
        }

        if !target.primary_key.is_empty() {
            let mut keys: HashSet<String> = target
                .rows
                .iter()
                .map(|r| key_of(r, &target.primary_key))
                .collect();
            for row in rows {
                let key = key_of(row, &target.primary_key);
                if !keys.insert(key.clone()) {
                    return Err(DbError::Write(format!(
                        "duplicate entry {key} for key 'PRIMARY' in `{table}`"
                    )));
                }
            }
        }

        target.rows.extend(rows.iter().map(|r| RowData {
            entity: table.to_string(),
            field_values: r.field_values.clone(),
        }));
        Ok(rows.len() as u64)
    }

    async fn rename_tables(&self, renames: &[(String, String)]) -> Result<(), DbError> {
        let mut db = self.db.lock().await;

        // Validate the whole batch against a scratch namespace first.
        let mut names: HashSet<String> = db.tables.keys().cloned().collect();
        for (from, to) in renames {
            if db.rename_failures.contains(from) {
                return Err(DbError::Write(format!("rename of `{from}` was rejected")));
            }
            if !names.remove(from) {
                return Err(DbError::TableNotFound(from.clone()));
            }
            if !names.insert(to.clone()) {
                return Err(DbError::TableExists(to.clone()));
            }
        }

        for (from, to) in renames {
            if let Some(mut table) = db.tables.remove(from) {
                for row in &mut table.rows {
                    row.entity = to.clone();
                }
                db.tables.insert(to.clone(), table);
            }
        }
        Ok(())
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Memory
    }
}

/// Renders the primary key of `row` the way duplicate-key errors print it.
fn key_of(row: &RowData, primary_key: &[String]) -> String {
    let parts: Vec<String> = primary_key
        .iter()
        .map(|c| match row.get_value(c).as_string() {
            Some(s) => s,
            None => "NULL".to_string(),
        })
        .collect();
    format!("'{}'", parts.join("-"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::records::row::FieldValue;

    fn row(id: i64) -> RowData {
        RowData::new("t", vec![FieldValue::new("id", id)])
    }

    #[tokio::test]
    async fn create_statement_keeps_the_current_name() {
        let db = MemoryAdapter::new();
        db.create_table("t", &["id", "name"], &["id"]).await.unwrap();
        db.rename_tables(&[("t".into(), "u".into())]).await.unwrap();

        let ddl = db.create_statement("u").await.unwrap();
        assert!(ddl.starts_with("CREATE TABLE `u` ("));
        assert_eq!(db.primary_key("u").await.unwrap(), vec!["id".to_string()]);
        assert_eq!(db.columns("u").await.unwrap(), vec!["id", "name"]);
        assert!(!db.table_exists("t").await.unwrap());
    }

    #[tokio::test]
    async fn fetch_orders_and_windows_rows() {
        let db = MemoryAdapter::new();
        db.create_table("t", &["id"], &["id"]).await.unwrap();
        db.insert_fixture("t", (1..=5).rev().map(row).collect())
            .await
            .unwrap();

        let request = FetchRowsRequest {
            table: "t".into(),
            order_by: vec!["id".into()],
            offset: 1,
            limit: Some(2),
        };
        let ids: Vec<_> = db
            .fetch_rows(request)
            .await
            .unwrap()
            .iter()
            .map(|r| r.get_value("id"))
            .collect();
        assert_eq!(ids, vec![2i64.into(), 3i64.into()]);
    }

    #[tokio::test]
    async fn failed_insert_writes_nothing() {
        let db = MemoryAdapter::new();
        db.create_table("t", &["id"], &[]).await.unwrap();
        db.fail_next_inserts("t", 1).await;

        assert!(db.insert_rows("t", &[row(1)]).await.is_err());
        assert_eq!(db.row_count("t").await.unwrap(), 0);
        assert_eq!(db.insert_rows("t", &[row(1), row(2)]).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn duplicate_primary_key_rejects_the_whole_batch() {
        let db = MemoryAdapter::new();
        db.create_table("t", &["id"], &["id"]).await.unwrap();
        db.insert_rows("t", &[row(1), row(2)]).await.unwrap();

        let err = db.insert_rows("t", &[row(3), row(2)]).await.unwrap_err();
        assert!(matches!(err, DbError::Write(msg) if msg.contains("'2'")));
        assert!(db.insert_rows("t", &[row(4), row(4)]).await.is_err());
        assert_eq!(db.row_count("t").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn rename_batch_is_all_or_nothing() {
        let db = MemoryAdapter::new();
        db.create_table("a", &["id"], &[]).await.unwrap();
        db.create_table("b", &["id"], &[]).await.unwrap();

        let err = db
            .rename_tables(&[("a".into(), "c".into()), ("b".into(), "c".into())])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::TableExists(name) if name == "c"));
        assert_eq!(db.table_names().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn create_collides_with_existing_table() {
        let db = MemoryAdapter::new();
        db.create_table("t", &["id"], &[]).await.unwrap();
        let err = db.create_table("t", &["id"], &[]).await.unwrap_err();
        assert!(matches!(err, DbError::TableExists(_)));

        db.exec("DROP TABLE IF EXISTS `missing`").await.unwrap();
        db.exec("DROP TABLE `t`").await.unwrap();
        assert!(db.table_names().await.is_empty());
    }
}
