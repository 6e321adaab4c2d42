//! Per-role core container
//!
//! Owns the registration map for one role. The map holds the initial
//! reference of every registered core; lookups hand out additional
//! references as [`RefHandle`]s. The map lock is never held while a core
//! is built or closed.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ch_01_plugin_registry::{MonitorRegistry, Monitorable};
use ch_02_core_lifecycle::RefHandle;
use core_telemetry::CORE_INIT_FAILURES;
use parking_lot::{Mutex, RwLock};
use shared_types::{ConfigNode, CoreError, CoreResult, ErrorKind, NamedList};
use tracing::{debug, error, info, warn};

use super::config::role_cores_path;
use crate::context::ProcessContext;
use crate::cores::{validate_core_name, Core, CoreDescriptor};

/// Monitor scope for containers. Core names cannot start with `_`.
pub const CONTAINER_MONITOR_SCOPE: &str = "_container";

/// A core that failed to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitFailure {
    pub name: String,
    pub kind: ErrorKind,
    pub message: String,
}

pub struct CoreContainer {
    role: String,
    default_core_name: String,
    ctx: Arc<ProcessContext>,
    cores: RwLock<BTreeMap<String, RefHandle<Core>>>,
    /// Declarations by registration name, kept for cores that failed too.
    declared: RwLock<BTreeMap<String, CoreDescriptor>>,
    /// Insertion-ordered; a newer failure for a name replaces the older one
    /// and moves to the end.
    failures: Mutex<Vec<InitFailure>>,
    inited: AtomicBool,
    on_inited_done: AtomicBool,
    shut_down: AtomicBool,
}

impl CoreContainer {
    pub fn new(
        role: impl Into<String>,
        default_core_name: impl Into<String>,
        ctx: Arc<ProcessContext>,
    ) -> Self {
        Self {
            role: role.into(),
            default_core_name: default_core_name.into(),
            ctx,
            cores: RwLock::new(BTreeMap::new()),
            declared: RwLock::new(BTreeMap::new()),
            failures: Mutex::new(Vec::new()),
            inited: AtomicBool::new(false),
            on_inited_done: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn default_core_name(&self) -> &str {
        &self.default_core_name
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Load every core declared under `roles.<role>.cores`. Valid once.
    ///
    /// A core that fails to load is recorded in [`Self::init_failures`]
    /// and the remaining cores still load. Returns the number registered.
    pub fn init(&self, root: &ConfigNode) -> CoreResult<usize> {
        if self.inited.swap(true, Ordering::AcqRel) {
            return Err(CoreError::contract(
                format!("container:{}", self.role),
                "already initialized",
            ));
        }

        let entries = root.nodes(&role_cores_path(&self.role));
        let mut loaded = 0;
        for (idx, node) in entries.iter().enumerate() {
            let descriptor = match CoreDescriptor::from_config(&self.role, node) {
                Ok(d) => d,
                Err(e) => {
                    let name = node
                        .get_str("name")
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("{}[{idx}]", role_cores_path(&self.role)));
                    self.record_failure(&name, &e);
                    continue;
                }
            };
            let name = descriptor.name().to_string();
            if self.declared.read().contains_key(&name) {
                let e = CoreError::config(node.context("name"), format!("duplicate core '{name}'"));
                self.record_failure(&name, &e);
                continue;
            }
            self.declared.write().insert(name.clone(), descriptor.clone());

            match self.build_core(&descriptor) {
                Ok(core) => {
                    self.register(&name, core, false);
                    loaded += 1;
                }
                Err(e) => self.record_failure(&name, &e),
            }
        }

        info!(
            role = %self.role,
            declared = entries.len(),
            loaded,
            failed = self.failures.lock().len(),
            "[container] Container initialized"
        );
        Ok(loaded)
    }

    /// Build and initialize a core without registering it.
    fn build_core(&self, descriptor: &CoreDescriptor) -> CoreResult<Arc<Core>> {
        let factory = self
            .ctx
            .core_factory(descriptor.factory())
            .map_err(|e| e.within(descriptor.name()))?;
        let core = factory.create(descriptor, &self.ctx)?;
        core.on_inited()?;
        Ok(core)
    }

    fn record_failure(&self, name: &str, err: &CoreError) {
        CORE_INIT_FAILURES.inc();
        error!(role = %self.role, core = %name, error = %err, "[container] Core failed to load");
        let mut failures = self.failures.lock();
        failures.retain(|f| f.name != name);
        failures.push(InitFailure {
            name: name.to_string(),
            kind: err.kind(),
            message: err.to_string(),
        });
    }

    fn clear_failure(&self, name: &str) {
        self.failures.lock().retain(|f| f.name != name);
    }

    /// Open a reference to a registered core. An empty name means the
    /// default core. `None` when absent or already closing.
    pub fn get_core(&self, name: &str) -> Option<RefHandle<Core>> {
        let name = if name.is_empty() {
            self.default_core_name.as_str()
        } else {
            name
        };
        let cores = self.cores.read();
        let registered = cores.get(name)?;
        match RefHandle::open(registered.arc()) {
            Ok(handle) => Some(handle),
            Err(e) => {
                debug!(core = %name, error = %e, "[container] Core not available");
                None
            }
        }
    }

    /// Register `core` under `name`, taking over its initial reference.
    ///
    /// The displaced core, if any, is returned still open when
    /// `return_previous` is set; otherwise it is closed once, after the map
    /// lock is released.
    pub fn register(
        &self,
        name: &str,
        core: Arc<Core>,
        return_previous: bool,
    ) -> Option<RefHandle<Core>> {
        let handle = RefHandle::adopt(core);
        let descriptor = handle.descriptor().clone();
        // The flag is read under the map lock that shutdown drains with.
        let previous = {
            let mut cores = self.cores.write();
            if self.is_shut_down() {
                Err(handle)
            } else {
                Ok(cores.insert(name.to_string(), handle))
            }
        };
        let previous = match previous {
            Ok(previous) => previous,
            Err(handle) => {
                warn!(role = %self.role, core = %name, "[container] Register after shutdown, closing core");
                drop(handle);
                return None;
            }
        };
        self.declared
            .write()
            .entry(name.to_string())
            .or_insert(descriptor);
        self.clear_failure(name);
        debug!(
            role = %self.role,
            core = %name,
            replaced = previous.is_some(),
            "[container] Core registered"
        );

        if return_previous {
            previous
        } else {
            drop(previous);
            None
        }
    }

    /// Names of registered cores, sorted.
    pub fn core_names(&self) -> Vec<String> {
        self.cores.read().keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cores.read().contains_key(name)
    }

    /// Whether `name` is registered or was declared here.
    pub fn knows(&self, name: &str) -> bool {
        self.declared.read().contains_key(name) || self.contains(name)
    }

    pub fn init_failures(&self) -> Vec<InitFailure> {
        self.failures.lock().clone()
    }

    /// Declaration behind `name`, whether or not it loaded.
    pub fn descriptor(&self, name: &str) -> Option<CoreDescriptor> {
        self.declared.read().get(name).cloned()
    }

    /// Build a fresh core from the same declaration and swap it in. The
    /// old core closes once its in-flight references are released.
    pub fn reload(&self, name: &str) -> CoreResult<()> {
        let descriptor = self
            .descriptor(name)
            .ok_or_else(|| CoreError::NotFound(format!("core '{name}'")))?;
        match self.build_core(&descriptor) {
            Ok(core) => {
                self.register(name, core, false);
                info!(role = %self.role, core = %name, "[container] Core reloaded");
                Ok(())
            }
            Err(e) => {
                self.record_failure(name, &e);
                Err(e)
            }
        }
    }

    /// Remove `name` and close it.
    pub fn unload(&self, name: &str) -> CoreResult<()> {
        let removed = self.cores.write().remove(name);
        let declared = self.declared.write().remove(name);
        self.clear_failure(name);
        match (removed, declared) {
            (None, None) => Err(CoreError::NotFound(format!("core '{name}'"))),
            (removed, _) => {
                drop(removed);
                info!(role = %self.role, core = %name, "[container] Core unloaded");
                Ok(())
            }
        }
    }

    /// Exchange the registrations of `a` and `b`. Neither core is closed.
    pub fn swap(&self, a: &str, b: &str) -> CoreResult<()> {
        if a == b {
            return if self.contains(a) {
                Ok(())
            } else {
                Err(CoreError::NotFound(format!("core '{a}'")))
            };
        }
        {
            let mut cores = self.cores.write();
            for name in [a, b] {
                if !cores.contains_key(name) {
                    return Err(CoreError::NotFound(format!("core '{name}'")));
                }
            }
            let (Some(first), Some(second)) = (cores.remove(a), cores.remove(b)) else {
                return Err(CoreError::NotFound(format!("core '{a}' or '{b}'")));
            };
            cores.insert(a.to_string(), second);
            cores.insert(b.to_string(), first);
        }
        {
            let mut declared = self.declared.write();
            let first = declared.remove(a);
            let second = declared.remove(b);
            if let Some(d) = second {
                declared.insert(a.to_string(), d);
            }
            if let Some(d) = first {
                declared.insert(b.to_string(), d);
            }
        }
        info!(role = %self.role, a, b, "[container] Cores swapped");
        Ok(())
    }

    /// Re-create `old` under `new` and unload `old`.
    pub fn rename(&self, old: &str, new: &str) -> CoreResult<()> {
        validate_core_name(new)?;
        if self.knows(new) {
            return Err(CoreError::config(
                format!("container:{}", self.role),
                format!("core '{new}' already exists"),
            ));
        }
        let descriptor = self
            .descriptor(old)
            .ok_or_else(|| CoreError::NotFound(format!("core '{old}'")))?
            .renamed(new);
        let core = self.build_core(&descriptor)?;
        self.declared.write().insert(new.to_string(), descriptor);
        self.register(new, core, false);
        self.unload(old)?;
        info!(role = %self.role, old, new, "[container] Core renamed");
        Ok(())
    }

    /// Build and register a core that was not declared at start-up.
    pub fn create(&self, descriptor: CoreDescriptor) -> CoreResult<()> {
        let name = descriptor.name().to_string();
        validate_core_name(&name)?;
        if self.knows(&name) {
            return Err(CoreError::config(
                format!("container:{}", self.role),
                format!("core '{name}' already exists"),
            ));
        }
        let core = match self.build_core(&descriptor) {
            Ok(core) => core,
            Err(e) => {
                self.record_failure(&name, &e);
                return Err(e);
            }
        };

        let handle = RefHandle::adopt(core);
        let rejected = {
            let mut cores = self.cores.write();
            let context = format!("container:{}", self.role);
            if self.is_shut_down() {
                Some((handle, CoreError::contract(context, "container is shut down")))
            } else if cores.contains_key(&name) {
                let err = CoreError::config(context, format!("core '{name}' already exists"));
                Some((handle, err))
            } else {
                cores.insert(name.clone(), handle);
                None
            }
        };
        if let Some((handle, err)) = rejected {
            drop(handle);
            return Err(err);
        }
        self.declared.write().insert(name.clone(), descriptor);
        self.clear_failure(&name);
        info!(role = %self.role, core = %name, "[container] Core created");
        Ok(())
    }

    /// Publish the container to monitoring. Valid once.
    pub fn on_inited(self: &Arc<Self>) -> CoreResult<()> {
        if self.on_inited_done.swap(true, Ordering::AcqRel) {
            return Err(CoreError::contract(
                format!("container:{}", self.role),
                "on_inited already ran",
            ));
        }
        self.ctx.monitors().register(
            CONTAINER_MONITOR_SCOPE,
            &self.role,
            Arc::clone(self) as Arc<dyn Monitorable>,
        );
        info!(
            role = %self.role,
            cores = self.cores.read().len(),
            "[container] Container ready"
        );
        Ok(())
    }

    /// Close every registered core. Idempotent. A core whose close panics
    /// is logged and the rest still close.
    pub fn shutdown(&self) -> usize {
        let drained = {
            let mut cores = self.cores.write();
            if self.shut_down.swap(true, Ordering::AcqRel) {
                return 0;
            }
            std::mem::take(&mut *cores)
        };
        self.ctx
            .monitors()
            .unregister(&MonitorRegistry::key(CONTAINER_MONITOR_SCOPE, &self.role));

        let mut closed = 0;
        for (name, handle) in drained {
            match catch_unwind(AssertUnwindSafe(move || drop(handle))) {
                Ok(()) => closed += 1,
                Err(_) => error!(role = %self.role, core = %name, "[container] Core close panicked"),
            }
        }
        info!(role = %self.role, closed, "[container] Container shut down");
        closed
    }

    pub fn status(&self) -> NamedList {
        let registered: Vec<(String, Arc<Core>)> = self
            .cores
            .read()
            .iter()
            .map(|(name, handle)| (name.clone(), Arc::clone(handle.arc())))
            .collect();
        let cores: NamedList = registered
            .into_iter()
            .map(|(name, core)| (name, core.describe()))
            .collect();
        let failures: NamedList = self
            .init_failures()
            .into_iter()
            .map(|f| {
                let entry = NamedList::new()
                    .with("kind", f.kind.to_string())
                    .with("message", f.message);
                (f.name, entry)
            })
            .collect();
        NamedList::new()
            .with("role", self.role.as_str())
            .with("default_core", self.default_core_name.as_str())
            .with("cores", cores)
            .with("init_failures", failures)
    }
}

impl Monitorable for CoreContainer {
    fn name(&self) -> String {
        self.role.clone()
    }

    fn category(&self) -> &str {
        "CONTAINER"
    }

    fn statistics(&self) -> NamedList {
        NamedList::new()
            .with("cores", self.cores.read().len())
            .with("init_failures", self.failures.lock().len())
    }
}

impl Drop for CoreContainer {
    fn drop(&mut self) {
        if !self.is_shut_down() && !self.cores.get_mut().is_empty() {
            warn!(role = %self.role, "[container] Dropped without shutdown");
        }
    }
}
