//! The core: one named logical server unit
//!
//! A core owns its descriptor, its configuration and a handler table
//! resolved through the plugin registry. Its release is governed by an
//! embedded [`Lifecycle`]; the container's registration holds the initial
//! reference and every lookup holds one more.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ch_01_plugin_registry::{MonitorRegistry, Monitorable, PluginHandle, PluginRegistry};
use ch_02_core_lifecycle::{Lifecycle, LifecycleState, Managed};
use core_telemetry::{record_request, time_histogram, REQUEST_DURATION};
use shared_types::{CoreError, CoreResult, NamedList, Value};
use tracing::{debug, info, warn};

use super::config::CoreConfig;
use super::descriptor::CoreDescriptor;
use super::request::{route_candidates, CoreRequest, RequestHandler};
use crate::context::ProcessContext;

/// Name of the core's own entry inside its monitor scope.
pub const CORE_MONITOR: &str = "core";

#[derive(Default)]
struct CoreStats {
    requests: AtomicU64,
    errors: AtomicU64,
}

pub struct Core {
    descriptor: CoreDescriptor,
    config: CoreConfig,
    lifecycle: Lifecycle,
    handlers: PluginRegistry<dyn RequestHandler>,
    monitors: Arc<MonitorRegistry>,
    started: Instant,
    stats: CoreStats,
}

impl Core {
    pub fn new(descriptor: CoreDescriptor, config: CoreConfig, ctx: &ProcessContext) -> Self {
        let name = descriptor.name().to_string();
        debug!(core = %name, role = %descriptor.role(), "[core] Core created");
        Self {
            lifecycle: Lifecycle::new(format!("core:{name}")),
            handlers: PluginRegistry::new(
                name,
                Arc::clone(ctx.handler_factories()),
                Some(Arc::clone(ctx.monitors())),
            ),
            monitors: Arc::clone(ctx.monitors()),
            descriptor,
            config,
            started: Instant::now(),
            stats: CoreStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn descriptor(&self) -> &CoreDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn open_count(&self) -> usize {
        self.lifecycle.open_count()
    }

    /// Build the handler table, register the core's monitor and move to
    /// `Inited`. Valid once, on a `Created` core.
    pub fn on_inited(self: &Arc<Self>) -> CoreResult<()> {
        if self.lifecycle.state() != LifecycleState::Created {
            return self.lifecycle.mark_inited();
        }
        if let Some(info) = self
            .config
            .plugins()
            .iter()
            .find(|info| info.name.trim_start_matches('/') == CORE_MONITOR)
        {
            return Err(CoreError::config(
                format!("{}/plugins/{}", self.name(), info.name),
                format!("handler name '{CORE_MONITOR}' is reserved for the core monitor"),
            ));
        }
        let handlers = self
            .handlers
            .load(self.config.plugins())
            .map_err(|e| CoreError::from(e).within(self.name()))?;
        self.monitors.register(
            self.name(),
            CORE_MONITOR,
            Arc::clone(self) as Arc<dyn Monitorable>,
        );
        if let Err(e) = self.lifecycle.mark_inited() {
            self.teardown();
            return Err(e);
        }
        info!(core = %self.name(), handlers, "[core] Core initialized");
        Ok(())
    }

    pub fn handler(&self, name: &str) -> Option<PluginHandle<dyn RequestHandler>> {
        self.handlers.get(name)
    }

    /// Handler names in declaration order.
    pub fn handler_names(&self) -> Vec<String> {
        self.handlers.names()
    }

    /// Resolve `path` to a handler by longest matching prefix. The root
    /// path resolves to the default handler.
    pub fn resolve(&self, path: &str) -> CoreResult<(String, Arc<dyn RequestHandler>)> {
        let candidates = route_candidates(path);
        let found = if candidates.is_empty() {
            self.handlers.default_plugin().map(|h| ("/".to_string(), h))
        } else {
            candidates
                .into_iter()
                .find_map(|name| self.handlers.get(&name).map(|h| (name, h)))
        };
        let (name, handle) = found
            .ok_or_else(|| CoreError::NotFound(format!("{}{}", self.name(), normalize(path))))?;
        let handler = handle
            .get()
            .map_err(|e| CoreError::from(e).within(self.name()))?;
        Ok((name, handler))
    }

    /// Route and run one request.
    pub fn handle(&self, request: &CoreRequest) -> CoreResult<NamedList> {
        self.lifecycle.ensure_inited()?;
        let _timer = time_histogram!(REQUEST_DURATION);
        self.stats.requests.fetch_add(1, Ordering::Relaxed);

        let result = self
            .resolve(&request.path)
            .and_then(|(name, handler)| {
                debug!(core = %self.name(), handler = %name, "[core] Dispatch");
                handler.handle(self, request)
            });

        record_request("core", result.is_ok());
        if let Err(e) = &result {
            self.stats.errors.fetch_add(1, Ordering::Relaxed);
            warn!(core = %self.name(), path = %request.path, error = %e, "[core] Request failed");
        }
        result
    }

    pub fn describe(&self) -> NamedList {
        NamedList::new()
            .with("name", self.name())
            .with("state", self.state().to_string())
            .with("open_count", self.open_count())
            .with("uptime_ms", self.started.elapsed().as_millis() as u64)
            .with("handlers", self.handler_names().into_iter().map(Value::from).collect::<Vec<_>>())
            .with("descriptor", self.descriptor.describe())
    }
}

fn normalize(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

impl Managed for Core {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Clears the handler table and unregisters this core's monitors. A
    /// replacement registered under the same name keeps its entries.
    fn teardown(&self) {
        let handlers = self.handlers.clear();
        self.monitors.unregister_item(
            &MonitorRegistry::key(self.name(), CORE_MONITOR),
            self as *const Self,
        );
        info!(core = %self.name(), handlers, "[core] Core closed");
    }
}

impl Monitorable for Core {
    fn name(&self) -> String {
        self.descriptor.name().to_string()
    }

    fn category(&self) -> &str {
        "CORE"
    }

    fn description(&self) -> String {
        format!("core '{}' ({})", self.descriptor.name(), self.descriptor.role())
    }

    fn statistics(&self) -> NamedList {
        NamedList::new()
            .with("state", self.state().to_string())
            .with("open_count", self.open_count())
            .with("requests", self.stats.requests.load(Ordering::Relaxed))
            .with("errors", self.stats.errors.load(Ordering::Relaxed))
            .with("handlers", self.handlers.len())
            .with("instance_dir", self.descriptor.instance_dir().display().to_string())
    }
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("name", &self.descriptor.name())
            .field("state", &self.state())
            .field("open_count", &self.open_count())
            .finish()
    }
}
