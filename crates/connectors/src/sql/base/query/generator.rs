use crate::sql::base::{dialect::Dialect, requests::FetchRowsRequest};

/// MySQL's documented way of saying "no row limit" when only an offset is wanted.
const UNBOUNDED_LIMIT: u64 = u64::MAX;

pub struct QueryGenerator<'a> {
    dialect: &'a dyn Dialect,
}

impl<'a> QueryGenerator<'a> {
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self { dialect }
    }

    /// `SELECT *` over a stable window of the table.
    pub fn select(&self, request: &FetchRowsRequest) -> String {
        let mut sql = format!("SELECT * FROM {}", self.ident(&request.table));

        if !request.order_by.is_empty() {
            let order = request
                .order_by
                .iter()
                .map(|c| self.ident(c))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ORDER BY {order}"));
        }

        match (request.offset, request.limit) {
            (0, None) => {}
            (offset, None) => sql.push_str(&format!(" LIMIT {offset}, {UNBOUNDED_LIMIT}")),
            (offset, Some(limit)) => sql.push_str(&format!(" LIMIT {offset}, {limit}")),
        }

        sql
    }

    pub fn count(&self, table: &str) -> String {
        format!("SELECT COUNT(1) FROM {}", self.ident(table))
    }

    pub fn show_create(&self, table: &str) -> String {
        format!("SHOW CREATE TABLE {}", self.ident(table))
    }

    /// Multi-row INSERT with one placeholder per value.
    pub fn insert(&self, table: &str, columns: &[String], rows: usize) -> String {
        let cols = columns
            .iter()
            .map(|c| self.ident(c))
            .collect::<Vec<_>>()
            .join(", ");

        let mut index = 0;
        let tuples = (0..rows)
            .map(|_| {
                let placeholders = (0..columns.len())
                    .map(|_| {
                        let p = self.dialect.get_placeholder(index);
                        index += 1;
                        p
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({placeholders})")
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!("INSERT INTO {} ({cols}) VALUES {tuples}", self.ident(table))
    }

    pub fn rename(&self, renames: &[(String, String)]) -> String {
        let pairs = renames
            .iter()
            .map(|(from, to)| format!("{} TO {}", self.ident(from), self.ident(to)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("RENAME TABLE {pairs}")
    }

    fn ident(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }
}
