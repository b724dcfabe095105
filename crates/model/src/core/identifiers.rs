use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// Infix separating a live table name from the generation tag of its shadow.
pub const SHADOW_INFIX: &str = "_sync_";

/// Longest identifier MySQL accepts for a table.
pub const MAX_IDENTIFIER_LEN: usize = 64;

const BACKUP_SUFFIX_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Arc<str>);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of the write target for `table` during the run tagged `generation`.
pub fn shadow_table_name(table: &str, generation: i64) -> String {
    format!("{table}{SHADOW_INFIX}{generation}")
}

/// Name the previous live `table` is moved to when a cutover happens at `at`.
pub fn backup_table_name(table: &str, at: DateTime<Utc>) -> String {
    format!("{table}_{}", at.format(BACKUP_SUFFIX_FORMAT))
}

/// Whether `name` is a plain unquoted-safe table identifier.
pub fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !name.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn shadow_name_carries_generation() {
        assert_eq!(shadow_table_name("orders", 1700000000), "orders_sync_1700000000");
    }

    #[test]
    fn backup_name_uses_compact_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(backup_table_name("orders", at), "orders_20240309070501");
    }

    #[test]
    fn rejects_unsafe_table_names() {
        assert!(is_valid_table_name("order_items"));
        assert!(is_valid_table_name("t$1"));
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("123"));
        assert!(!is_valid_table_name("orders; DROP TABLE x"));
        assert!(!is_valid_table_name("`orders`"));
        assert!(!is_valid_table_name(&"a".repeat(65)));
    }
}
