use crate::{
    error::StateStoreError,
    state::models::{JobRecord, WalEntry},
};
use async_trait::async_trait;

pub mod models;
pub mod sled_store;

/// Durable home of job records and their write-ahead log.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save_job(&self, record: &JobRecord) -> Result<(), StateStoreError>;
    async fn load_job(&self, job_id: &str) -> Result<Option<JobRecord>, StateStoreError>;
    async fn job_ids(&self) -> Result<Vec<String>, StateStoreError>;
    async fn append_wal(&self, entry: &WalEntry) -> Result<(), StateStoreError>;
    async fn iter_wal(&self, job_id: &str) -> Result<Vec<WalEntry>, StateStoreError>;
}
