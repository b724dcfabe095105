use crate::{
    error::AdapterError,
    sql::{
        base::adapter::{DatabaseKind, SqlAdapter},
        mysql::adapter::MySqlAdapter,
    },
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tracing::info;

/// Opens a store handle for `url`, picking the driver from the URL scheme.
pub async fn connect(url: &str) -> Result<Arc<dyn SqlAdapter>, AdapterError> {
    match DatabaseKind::from_url(url) {
        DatabaseKind::MySql => {
            let adapter = MySqlAdapter::connect(url).await?;
            Ok(Arc::new(adapter))
        }
        #[cfg(feature = "memory")]
        DatabaseKind::Memory => {
            use crate::sql::memory::adapter::MemoryAdapter;
            Ok(Arc::new(MemoryAdapter::connect(url).await?))
        }
        #[cfg(not(feature = "memory"))]
        DatabaseKind::Memory => Err(AdapterError::UnsupportedDriver("memory".into())),
        DatabaseKind::Other(scheme) => Err(AdapterError::UnsupportedDriver(scheme)),
    }
}

/// Named store handles shared by every step of a job.
#[derive(Clone, Default)]
pub struct StoreRegistry {
    stores: HashMap<String, Arc<dyn SqlAdapter>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, adapter: Arc<dyn SqlAdapter>) {
        self.stores.insert(id.into(), adapter);
    }

    /// Connects every `id -> url` pair, failing on the first store that cannot be reached.
    pub async fn connect_all(urls: &BTreeMap<String, String>) -> Result<Self, AdapterError> {
        let mut registry = Self::new();
        for (id, url) in urls {
            let adapter = connect(url).await?;
            info!(store = %id, kind = ?adapter.kind(), "Connected to store");
            registry.register(id.clone(), adapter);
        }
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn SqlAdapter>, AdapterError> {
        self.stores
            .get(id)
            .cloned()
            .ok_or_else(|| AdapterError::UnknownStore(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.stores.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::memory::adapter::MemoryAdapter;

    #[test]
    fn unknown_store_is_reported_by_id() {
        let mut registry = StoreRegistry::new();
        registry.register("main", Arc::new(MemoryAdapter::new()));

        assert!(registry.contains("main"));
        assert!(registry.get("main").is_ok());
        assert!(matches!(
            registry.get("replica"),
            Err(AdapterError::UnknownStore(id)) if id == "replica"
        ));
    }

    #[tokio::test]
    async fn unsupported_scheme_is_rejected() {
        let err = connect("postgres://localhost/db").await.err();
        assert!(matches!(err, Some(AdapterError::UnsupportedDriver(s)) if s == "postgres"));
    }
}
