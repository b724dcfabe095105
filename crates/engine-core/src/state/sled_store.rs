use crate::{
    error::StateStoreError,
    state::{
        StateStore,
        models::{JobRecord, WalEntry},
    },
};
use async_trait::async_trait;
use std::path::Path;

const JOB_PREFIX: &str = "job:";
const WAL_PREFIX: &str = "wal:";

pub struct SledStateStore {
    db: sled::Db,
}

impl SledStateStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StateStoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// `:` separates the job id from the sequence number in WAL keys.
    fn checked(job_id: &str) -> Result<&str, StateStoreError> {
        if job_id.is_empty() || job_id.contains(':') {
            return Err(StateStoreError::InvalidJobId(job_id.to_string()));
        }
        Ok(job_id)
    }

    #[inline]
    fn job_key(job_id: &str) -> Result<String, StateStoreError> {
        Ok(format!("{JOB_PREFIX}{}", Self::checked(job_id)?))
    }

    #[inline]
    fn wal_prefix(job_id: &str) -> Result<String, StateStoreError> {
        Ok(format!("{WAL_PREFIX}{}:", Self::checked(job_id)?))
    }

    /// Zero-padded so that lexical key order matches append order.
    #[inline]
    fn wal_key(job_id: &str, seq: u64) -> Result<String, StateStoreError> {
        Ok(format!("{}{seq:020}", Self::wal_prefix(job_id)?))
    }
}

#[async_trait]
impl StateStore for SledStateStore {
    async fn save_job(&self, record: &JobRecord) -> Result<(), StateStoreError> {
        let key = Self::job_key(&record.job_id)?;
        let bytes = bincode::serialize(record)?;
        self.db.insert(key, bytes)?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn load_job(&self, job_id: &str) -> Result<Option<JobRecord>, StateStoreError> {
        match self.db.get(Self::job_key(job_id)?)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn job_ids(&self) -> Result<Vec<String>, StateStoreError> {
        let mut ids = Vec::new();
        for item in self.db.scan_prefix(JOB_PREFIX) {
            let (key, _) = item?;
            let key = String::from_utf8_lossy(&key);
            if let Some(id) = key.strip_prefix(JOB_PREFIX) {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }

    async fn append_wal(&self, entry: &WalEntry) -> Result<(), StateStoreError> {
        let seq = self.db.generate_id()?;
        let key = Self::wal_key(entry.job_id(), seq)?;
        let value = bincode::serialize(entry)?;
        self.db.insert(key, value)?;
        Ok(())
    }

    async fn iter_wal(&self, job_id: &str) -> Result<Vec<WalEntry>, StateStoreError> {
        let prefix = Self::wal_prefix(job_id)?;
        let mut entries = Vec::new();

        for item in self.db.scan_prefix(prefix) {
            let (_key, value) = item?;
            entries.push(bincode::deserialize(&value)?);
        }

        Ok(entries)
    }
}
