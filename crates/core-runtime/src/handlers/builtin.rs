use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ch_01_plugin_registry::{Monitorable, Plugin, PluginInfo};
use shared_types::{CoreResult, NamedList, Value};

use crate::cores::{Core, CoreRequest, RequestHandler};

/// Liveness check. Counts its calls and exposes them to monitoring.
pub struct PingHandler {
    name: String,
    calls: AtomicU64,
}

impl PingHandler {
    pub fn new(info: &PluginInfo) -> Self {
        Self {
            name: info.name.clone(),
            calls: AtomicU64::new(0),
        }
    }
}

impl Plugin for PingHandler {
    fn as_monitorable(self: Arc<Self>) -> Option<Arc<dyn Monitorable>> {
        Some(self as Arc<dyn Monitorable>)
    }
}

impl RequestHandler for PingHandler {
    fn handle(&self, core: &Core, _request: &CoreRequest) -> CoreResult<NamedList> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(NamedList::new()
            .with("status", "OK")
            .with("core", core.name()))
    }
}

impl Monitorable for PingHandler {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn category(&self) -> &str {
        "ADMIN"
    }

    fn statistics(&self) -> NamedList {
        NamedList::new().with("calls", self.calls.load(Ordering::Relaxed))
    }
}

/// Returns what it was sent. Init arg `prefix` is added to the response
/// when set.
pub struct EchoHandler {
    prefix: Option<String>,
}

impl EchoHandler {
    pub fn new(info: &PluginInfo) -> Self {
        Self {
            prefix: info.args.get_str("prefix").map(str::to_string),
        }
    }
}

impl Plugin for EchoHandler {}

impl RequestHandler for EchoHandler {
    fn handle(&self, _core: &Core, request: &CoreRequest) -> CoreResult<NamedList> {
        let mut response = NamedList::new()
            .with("path", request.path.as_str())
            .with("params", request.params.clone());
        if let Some(prefix) = &self.prefix {
            response.add("prefix", prefix.as_str());
        }
        if let Some(body) = &request.body {
            response.add("body", Value::Str(body.to_string()));
        }
        Ok(response)
    }
}

/// The owning core's description.
pub struct StatsHandler;

impl Plugin for StatsHandler {}

impl RequestHandler for StatsHandler {
    fn handle(&self, core: &Core, _request: &CoreRequest) -> CoreResult<NamedList> {
        Ok(core.describe())
    }
}
