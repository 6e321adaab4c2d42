//! Lazy plugin wrapper
//!
//! Defers instantiation to the first `get()`. The instance is published
//! through a `OnceLock`; the slow path serializes on a mutex and re-checks,
//! so concurrent first callers trigger exactly one factory call. A failed
//! factory call publishes nothing and the next caller retries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::domain::{MonitorRegistry, Plugin, PluginInfo};
use crate::error::PluginError;
use crate::factory::FactoryRegistry;

/// Where a lazily created instance registers its monitor.
#[derive(Clone)]
pub(crate) struct MonitorTarget {
    pub(crate) registry: Arc<MonitorRegistry>,
    pub(crate) scope: String,
}

/// Deferred plugin instance.
pub struct LazyPlugin<T: ?Sized + 'static> {
    info: PluginInfo,
    factories: Arc<FactoryRegistry<T>>,
    instance: OnceLock<Arc<T>>,
    init_lock: Mutex<()>,
    attempts: AtomicUsize,
    monitor: Option<MonitorTarget>,
}

impl<T: ?Sized + Plugin> LazyPlugin<T> {
    pub(crate) fn new(
        info: PluginInfo,
        factories: Arc<FactoryRegistry<T>>,
        monitor: Option<MonitorTarget>,
    ) -> Self {
        Self {
            info,
            factories,
            instance: OnceLock::new(),
            init_lock: Mutex::new(()),
            attempts: AtomicUsize::new(0),
            monitor,
        }
    }

    pub fn info(&self) -> &PluginInfo {
        &self.info
    }

    /// Whether the instance has been created.
    pub fn is_loaded(&self) -> bool {
        self.instance.get().is_some()
    }

    /// Number of factory calls made so far, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Acquire)
    }

    /// The instance if already created, without triggering creation.
    pub fn peek(&self) -> Option<Arc<T>> {
        self.instance.get().cloned()
    }

    /// Get or create the instance.
    pub fn get(&self) -> Result<Arc<T>, PluginError> {
        if let Some(instance) = self.instance.get() {
            return Ok(Arc::clone(instance));
        }

        let _guard = self.init_lock.lock();
        if let Some(instance) = self.instance.get() {
            return Ok(Arc::clone(instance));
        }

        self.attempts.fetch_add(1, Ordering::AcqRel);
        let instance = match self.factories.create(&self.info) {
            Ok(instance) => instance,
            Err(e) => {
                warn!(plugin = %self.info.name, error = %e, "[ch-01] Lazy instantiation failed");
                return Err(e);
            }
        };

        if let Some(target) = &self.monitor {
            if let Some(m) = Arc::clone(&instance).as_monitorable() {
                target.registry.register(&target.scope, &self.info.name, m);
            }
        }

        // Only this guarded path ever sets the cell.
        let _ = self.instance.set(Arc::clone(&instance));
        info!(plugin = %self.info.name, class = %self.info.class, "[ch-01] Lazy plugin created");
        Ok(instance)
    }
}

impl<T: ?Sized + 'static> std::fmt::Debug for LazyPlugin<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyPlugin")
            .field("name", &self.info.name)
            .field("class", &self.info.class)
            .field("loaded", &self.instance.get().is_some())
            .finish()
    }
}
