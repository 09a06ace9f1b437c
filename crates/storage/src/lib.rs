pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use common::{CandleStorage, OrderStorage, PortfolioSnapshotStorage, Registry, Result, StrategyRunStorage};

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

/// Named storage instances a strategy run can be bound to.
///
/// Candle and order storages are looked up by the names recorded on each
/// `StrategyRun`; run and snapshot storage is process-wide.
pub struct StorageRegistry {
    candles: Registry<Arc<dyn CandleStorage>>,
    orders: Registry<Arc<dyn OrderStorage>>,
    runs: Arc<dyn StrategyRunStorage>,
    snapshots: Arc<dyn PortfolioSnapshotStorage>,
}

impl StorageRegistry {
    pub fn new(runs: Arc<dyn StrategyRunStorage>, snapshots: Arc<dyn PortfolioSnapshotStorage>) -> Self {
        Self {
            candles: Registry::new("candle storage"),
            orders: Registry::new("order storage"),
            runs,
            snapshots,
        }
    }

    /// Registry backed entirely by one in-memory store named `"memory"`.
    pub fn in_memory() -> (Self, Arc<MemoryStorage>) {
        let memory = Arc::new(MemoryStorage::new());
        let mut registry = Self::new(memory.clone(), memory.clone());
        registry
            .register_candles("memory", memory.clone())
            .register_orders("memory", memory.clone());
        (registry, memory)
    }

    pub fn register_candles(&mut self, name: impl Into<String>, storage: Arc<dyn CandleStorage>) -> &mut Self {
        self.candles.register(name, storage);
        self
    }

    pub fn register_orders(&mut self, name: impl Into<String>, storage: Arc<dyn OrderStorage>) -> &mut Self {
        self.orders.register(name, storage);
        self
    }

    pub fn candles(&self, name: &str) -> Result<Arc<dyn CandleStorage>> {
        self.candles.get(name).cloned()
    }

    pub fn orders(&self, name: &str) -> Result<Arc<dyn OrderStorage>> {
        self.orders.get(name).cloned()
    }

    pub fn runs(&self) -> Arc<dyn StrategyRunStorage> {
        self.runs.clone()
    }

    pub fn snapshots(&self) -> Arc<dyn PortfolioSnapshotStorage> {
        self.snapshots.clone()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_storage_name_is_reported() {
        let (registry, _) = StorageRegistry::in_memory();
        assert!(registry.candles("memory").is_ok());
        assert!(matches!(
            registry.orders("postgres"),
            Err(common::Error::PluginNotFound { name, .. }) if name == "postgres"
        ));
    }
}
