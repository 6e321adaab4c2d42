//! Process context
//!
//! Everything process-wide that cores and containers share: the monitor
//! registry, the handler and core factory registries, the store and the
//! cluster. One instance is built by [`crate::CoreContainers`] and handed
//! down by reference.

use std::collections::BTreeMap;
use std::sync::Arc;

use ch_01_plugin_registry::{FactoryRegistry, MonitorRegistry};
use ch_03_core_store::CoreStore;
use ch_04_core_cluster::CoreCluster;
use parking_lot::RwLock;
use shared_types::{CoreError, CoreResult};
use tracing::warn;

use crate::cores::{CoreFactory, RequestHandler, StandardCoreFactory, DEFAULT_FACTORY};
use crate::handlers::register_builtins;

pub struct ProcessContext {
    monitors: Arc<MonitorRegistry>,
    handlers: Arc<FactoryRegistry<dyn RequestHandler>>,
    core_factories: RwLock<BTreeMap<String, Arc<dyn CoreFactory>>>,
    store: Arc<CoreStore>,
    cluster: Arc<CoreCluster>,
}

impl ProcessContext {
    /// Context with the built-in handlers and the `"default"` core factory
    /// registered.
    pub fn new(store: Arc<CoreStore>, cluster: Arc<CoreCluster>) -> Self {
        let handlers: Arc<FactoryRegistry<dyn RequestHandler>> = Arc::new(FactoryRegistry::new());
        register_builtins(&handlers);

        let mut core_factories: BTreeMap<String, Arc<dyn CoreFactory>> = BTreeMap::new();
        core_factories.insert(DEFAULT_FACTORY.to_string(), Arc::new(StandardCoreFactory));

        Self {
            monitors: Arc::new(MonitorRegistry::new()),
            handlers,
            core_factories: RwLock::new(core_factories),
            store,
            cluster,
        }
    }

    pub fn monitors(&self) -> &Arc<MonitorRegistry> {
        &self.monitors
    }

    /// Handler implementations available to `plugins[].class`.
    pub fn handler_factories(&self) -> &Arc<FactoryRegistry<dyn RequestHandler>> {
        &self.handlers
    }

    /// Register a core factory under `key`, replacing any previous one.
    pub fn register_core_factory(&self, key: impl Into<String>, factory: Arc<dyn CoreFactory>) {
        let key = key.into();
        if self.core_factories.write().insert(key.clone(), factory).is_some() {
            warn!(key = %key, "[runtime] Core factory re-registered");
        }
    }

    pub fn core_factory(&self, key: &str) -> CoreResult<Arc<dyn CoreFactory>> {
        self.core_factories
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| CoreError::config("factory", format!("unknown core factory '{key}'")))
    }

    pub fn core_factory_keys(&self) -> Vec<String> {
        self.core_factories.read().keys().cloned().collect()
    }

    pub fn store(&self) -> &Arc<CoreStore> {
        &self.store
    }

    pub fn cluster(&self) -> &Arc<CoreCluster> {
        &self.cluster
    }
}

impl std::fmt::Debug for ProcessContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessContext")
            .field("monitors", &self.monitors.len())
            .field("handlers", &self.handlers.keys())
            .field("core_factories", &self.core_factory_keys())
            .finish()
    }
}
