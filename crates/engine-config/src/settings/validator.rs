use crate::{
    error::ConfigError,
    settings::{ChunkSetting, SyncConfig},
};
use model::core::identifiers::{MAX_IDENTIFIER_LEN, SHADOW_INFIX, is_valid_table_name};
use std::collections::HashSet;
use tracing::{info, warn};

/// Digits of a unix-seconds generation tag until the year 2286.
const GENERATION_DIGITS: usize = 10;

const LARGE_CHUNK_ROWS: u64 = 100_000;

/// Checks a config before a job is planned from it.
pub struct ConfigValidator<'a> {
    config: &'a SyncConfig,
}

impl<'a> ConfigValidator<'a> {
    pub fn new(config: &'a SyncConfig) -> Self {
        Self { config }
    }

    /// Collects every problem instead of stopping at the first one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_stores(&mut errors);
        self.validate_tables(&mut errors);
        self.validate_attempts(&mut errors);

        if !errors.is_empty() {
            return Err(ConfigError::ValidationFailed(errors));
        }

        info!("Config validation completed successfully");
        Ok(())
    }

    fn validate_stores(&self, errors: &mut Vec<String>) {
        let config = self.config;
        for (role, id) in [("source", &config.source), ("destination", &config.destination)] {
            if !config.stores.contains_key(id) {
                errors.push(format!("{role} store `{id}` is not defined in stores"));
            }
        }

        if config.source == config.destination {
            errors.push(format!(
                "source and destination must be different stores, both are `{}`",
                config.source
            ));
        }
    }

    fn validate_tables(&self, errors: &mut Vec<String>) {
        if self.config.tables.is_empty() {
            errors.push("at least one table must be configured".to_string());
            return;
        }

        let mut seen = HashSet::new();
        for table in &self.config.tables {
            let name = table.name.as_str();

            if !is_valid_table_name(name) {
                errors.push(format!("invalid table name `{name}`"));
            } else if name.len() + SHADOW_INFIX.len() + GENERATION_DIGITS > MAX_IDENTIFIER_LEN {
                errors.push(format!(
                    "table name `{name}` is too long to derive a shadow table name"
                ));
            }

            if !seen.insert(name) {
                errors.push(format!("table `{name}` is listed more than once"));
            }

            match table.chunk_size {
                ChunkSetting::Rows(0) => {
                    errors.push(format!("chunk_size of `{name}` must be a positive row count"))
                }
                ChunkSetting::Rows(n) if n > LARGE_CHUNK_ROWS => warn!(
                    "Chunk size {} for `{}` is very large, one invocation may hold a long transaction",
                    n, name
                ),
                _ => {}
            }
        }
    }

    fn validate_attempts(&self, errors: &mut Vec<String>) {
        if self.config.max_chunk_attempts == 0 {
            errors.push("max_chunk_attempts must be at least 1".to_string());
        }
    }
}
