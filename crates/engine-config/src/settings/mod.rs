use crate::{error::ConfigError, settings::validator::ConfigValidator};
use model::execution::options::{ChunkSize, CutoverMode, ErrorPolicy, SyncOptions, TableSpec};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::info;

pub mod validator;

pub const DEFAULT_MAX_CHUNK_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKeyword {
    All,
    /// Same as `all`.
    Once,
}

/// `chunk_size` as written in the config: a row count or a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkSetting {
    Rows(u64),
    Keyword(ChunkKeyword),
}

impl Default for ChunkSetting {
    fn default() -> Self {
        ChunkSetting::Keyword(ChunkKeyword::All)
    }
}

impl From<ChunkSetting> for ChunkSize {
    fn from(setting: ChunkSetting) -> Self {
        match setting {
            ChunkSetting::Rows(n) => ChunkSize::Rows(n),
            ChunkSetting::Keyword(_) => ChunkSize::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,
    #[serde(default)]
    pub chunk_size: ChunkSetting,
}

/// A synchronization job as described in its JSON config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Store id to connection URL; URLs may reference `${VAR}`.
    pub stores: BTreeMap<String, String>,
    pub source: String,
    pub destination: String,
    pub tables: Vec<TableConfig>,
    #[serde(default)]
    pub on_error: ErrorPolicy,
    #[serde(default)]
    pub cutover: CutoverMode,
    #[serde(default = "default_max_chunk_attempts")]
    pub max_chunk_attempts: u32,
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

fn default_max_chunk_attempts() -> u32 {
    DEFAULT_MAX_CHUNK_ATTEMPTS
}

impl SyncConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads, parses and validates the config at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_json(&json)?;
        config.validate()?;
        info!(
            path = %path.display(),
            tables = config.tables.len(),
            "Loaded sync config"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigValidator::new(self).validate()
    }

    /// Options of a job started at `generation` (unix seconds).
    pub fn to_options(&self, generation: i64) -> SyncOptions {
        SyncOptions {
            source: self.source.clone(),
            destination: self.destination.clone(),
            generation,
            tables: self
                .tables
                .iter()
                .map(|t| TableSpec::new(t.name.clone(), t.chunk_size.into()))
                .collect(),
            on_error: self.on_error,
            cutover: self.cutover,
            max_chunk_attempts: self.max_chunk_attempts,
        }
    }

    /// Store URLs with every `${VAR}` replaced using `lookup`.
    pub fn resolved_stores<F>(&self, lookup: F) -> Result<BTreeMap<String, String>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.stores
            .iter()
            .map(|(id, url)| {
                let resolved = substitute_vars(id, url, &lookup)?;
                Ok::<_, ConfigError>((id.clone(), resolved))
            })
            .collect()
    }

    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(default_state_dir)
    }
}

/// `~/.tablesync/state`, or a relative `.tablesync/state` without a home directory.
pub fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".tablesync")
        .join("state")
}

fn substitute_vars<F>(store: &str, input: &str, lookup: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| ConfigError::UnterminatedVariable(store.to_string()))?;
        let var = &after[..end];
        let value = lookup(var).ok_or_else(|| ConfigError::MissingVariable {
            store: store.to_string(),
            var: var.to_string(),
        })?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}
