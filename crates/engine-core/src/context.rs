use connectors::{adapter::StoreRegistry, error::AdapterError, sql::base::adapter::SqlAdapter};
use model::execution::options::SyncOptions;
use std::sync::Arc;

/// The two store handles a job works against.
///
/// Every engine call receives the handle it operates on explicitly; nothing
/// switches an ambient "active" connection between calls.
#[derive(Clone)]
pub struct SyncContext {
    pub source: Arc<dyn SqlAdapter>,
    pub destination: Arc<dyn SqlAdapter>,
}

impl SyncContext {
    /// Resolves the source and destination store ids of `options`.
    pub fn from_registry(
        registry: &StoreRegistry,
        options: &SyncOptions,
    ) -> Result<Self, AdapterError> {
        Ok(Self {
            source: registry.get(&options.source)?,
            destination: registry.get(&options.destination)?,
        })
    }
}
