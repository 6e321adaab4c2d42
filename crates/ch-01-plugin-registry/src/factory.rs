//! Factory registry: implementation key → constructor.
//!
//! Populated explicitly at start-up. Configuration only ever supplies the
//! key; an unknown key is a configuration error.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::domain::PluginInfo;
use crate::error::PluginError;

/// Constructor for one implementation key.
pub type FactoryFn<T> = Arc<dyn Fn(&PluginInfo) -> Result<Arc<T>, PluginError> + Send + Sync>;

/// Map from implementation key to constructor.
pub struct FactoryRegistry<T: ?Sized + 'static> {
    factories: RwLock<HashMap<String, FactoryFn<T>>>,
}

impl<T: ?Sized + 'static> Default for FactoryRegistry<T> {
    fn default() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: ?Sized + 'static> FactoryRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor. Re-registering a key replaces it.
    pub fn register<F>(&self, key: impl Into<String>, factory: F)
    where
        F: Fn(&PluginInfo) -> Result<Arc<T>, PluginError> + Send + Sync + 'static,
    {
        let key = key.into();
        if self
            .factories
            .write()
            .insert(key.clone(), Arc::new(factory))
            .is_some()
        {
            warn!(key = %key, "[ch-01] Factory key re-registered");
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.factories.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Instantiate `info.class`. The factory runs outside the map lock.
    pub fn create(&self, info: &PluginInfo) -> Result<Arc<T>, PluginError> {
        let factory = self
            .factories
            .read()
            .get(&info.class)
            .cloned()
            .ok_or_else(|| PluginError::UnknownKey {
                name: info.name.clone(),
                key: info.class.clone(),
            })?;
        factory(info)
    }
}
