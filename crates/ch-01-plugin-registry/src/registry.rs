//! Plugin registry service
//!
//! Resolves declared [`PluginInfo`] entries into a name-keyed table of
//! [`PluginHandle`]s. Eager entries are instantiated during `load`; lazy
//! entries become [`LazyPlugin`] wrappers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::domain::{MonitorRegistry, Plugin, PluginInfo};
use crate::error::PluginError;
use crate::factory::FactoryRegistry;
use crate::lazy::{LazyPlugin, MonitorTarget};

/// An eager instance or a lazy wrapper, behind one calling contract.
pub enum PluginHandle<T: ?Sized + 'static> {
    Eager(Arc<T>),
    Lazy(Arc<LazyPlugin<T>>),
}

impl<T: ?Sized + 'static> Clone for PluginHandle<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Eager(i) => Self::Eager(Arc::clone(i)),
            Self::Lazy(l) => Self::Lazy(Arc::clone(l)),
        }
    }
}

impl<T: ?Sized + Plugin> PluginHandle<T> {
    /// The instance, creating it on first use for lazy entries.
    pub fn get(&self) -> Result<Arc<T>, PluginError> {
        match self {
            Self::Eager(i) => Ok(Arc::clone(i)),
            Self::Lazy(l) => l.get(),
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Self::Lazy(_))
    }

    /// Created already (always true for eager entries).
    pub fn is_loaded(&self) -> bool {
        match self {
            Self::Eager(_) => true,
            Self::Lazy(l) => l.is_loaded(),
        }
    }

    /// Existing instance without triggering lazy creation.
    pub fn peek(&self) -> Option<Arc<T>> {
        match self {
            Self::Eager(i) => Some(Arc::clone(i)),
            Self::Lazy(l) => l.peek(),
        }
    }
}

struct Entries<T: ?Sized + 'static> {
    by_name: HashMap<String, PluginHandle<T>>,
    order: Vec<String>,
    default_name: Option<String>,
}

impl<T: ?Sized + 'static> Default for Entries<T> {
    fn default() -> Self {
        Self {
            by_name: HashMap::new(),
            order: Vec::new(),
            default_name: None,
        }
    }
}

/// Name-keyed plugin table for one scope (typically one core).
pub struct PluginRegistry<T: ?Sized + 'static> {
    scope: String,
    factories: Arc<FactoryRegistry<T>>,
    monitors: Option<Arc<MonitorRegistry>>,
    entries: RwLock<Entries<T>>,
}

impl<T: ?Sized + Plugin> PluginRegistry<T> {
    /// `scope` prefixes monitor keys. Pass `None` to skip monitoring.
    pub fn new(
        scope: impl Into<String>,
        factories: Arc<FactoryRegistry<T>>,
        monitors: Option<Arc<MonitorRegistry>>,
    ) -> Self {
        Self {
            scope: scope.into(),
            factories,
            monitors,
            entries: RwLock::new(Entries::default()),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Resolve declarations. Every key is checked against the factory
    /// registry; eager entries are instantiated. The first eager failure
    /// aborts the load and nothing from this call is kept.
    pub fn load(&self, infos: &[PluginInfo]) -> Result<usize, PluginError> {
        let mut resolved: Vec<(PluginInfo, PluginHandle<T>)> = Vec::with_capacity(infos.len());

        for info in infos {
            if !self.factories.contains(&info.class) {
                return Err(PluginError::UnknownKey {
                    name: info.name.clone(),
                    key: info.class.clone(),
                });
            }
            let handle = if info.is_lazy() {
                PluginHandle::Lazy(Arc::new(LazyPlugin::new(
                    info.clone(),
                    Arc::clone(&self.factories),
                    self.monitor_target(),
                )))
            } else {
                PluginHandle::Eager(self.factories.create(info)?)
            };
            resolved.push((info.clone(), handle));
        }

        let count = resolved.len();
        for (info, handle) in resolved {
            debug!(
                scope = %self.scope,
                plugin = %info.name,
                startup = %info.startup,
                "[ch-01] Plugin resolved"
            );
            self.insert(&info.name, info.default, handle);
        }
        info!(scope = %self.scope, count, "[ch-01] Plugins loaded");
        Ok(count)
    }

    /// Register an instance directly, replacing any entry with that name.
    pub fn register(&self, name: &str, instance: Arc<T>) -> Option<PluginHandle<T>> {
        self.insert(name, false, PluginHandle::Eager(instance))
    }

    fn insert(&self, name: &str, is_default: bool, handle: PluginHandle<T>) -> Option<PluginHandle<T>> {
        if let (Some(monitors), Some(instance)) = (&self.monitors, handle.peek()) {
            if let Some(m) = instance.as_monitorable() {
                monitors.register(&self.scope, name, m);
            }
        }

        let mut entries = self.entries.write();
        if is_default {
            entries.default_name = Some(name.to_string());
        }
        let previous = entries.by_name.insert(name.to_string(), handle);
        if previous.is_none() {
            entries.order.push(name.to_string());
        }
        previous
    }

    fn monitor_target(&self) -> Option<MonitorTarget> {
        self.monitors.as_ref().map(|registry| MonitorTarget {
            registry: Arc::clone(registry),
            scope: self.scope.clone(),
        })
    }

    pub fn get(&self, name: &str) -> Option<PluginHandle<T>> {
        self.entries.read().by_name.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().by_name.contains_key(name)
    }

    /// The entry flagged default, else the one named `""`, else the first
    /// declared.
    pub fn default_plugin(&self) -> Option<PluginHandle<T>> {
        let entries = self.entries.read();
        let name = entries
            .default_name
            .clone()
            .or_else(|| entries.by_name.contains_key("").then(String::new))
            .or_else(|| entries.order.first().cloned())?;
        entries.by_name.get(&name).cloned()
    }

    /// Names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.read().order.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().by_name.is_empty()
    }

    /// Drop every entry and unregister the monitors of its instances.
    /// Entries another registry has since registered under the same keys
    /// are kept.
    pub fn clear(&self) -> usize {
        let taken = std::mem::take(&mut *self.entries.write());
        let removed = taken.by_name.len();
        if let Some(monitors) = &self.monitors {
            for (name, handle) in taken.by_name {
                let Some(item) = handle.peek().and_then(|i| i.as_monitorable()) else {
                    continue;
                };
                monitors.unregister_item(&MonitorRegistry::key(&self.scope, &name), Arc::as_ptr(&item));
            }
        }
        removed
    }
}

impl<T: ?Sized + 'static> std::fmt::Debug for PluginRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("scope", &self.scope)
            .field("names", &self.entries.read().order)
            .finish()
    }
}
