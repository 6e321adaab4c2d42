//! The administrative request router
//!
//! Independent of every core's handler table. Holds only a weak reference
//! to the containers so it never keeps them alive.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use ch_04_core_cluster::{AttachRequest, ClusterError, HostMode, HostNode};
use core_telemetry::record_request;
use serde::de::DeserializeOwned;
use serde_json::{json, Value as Json};
use shared_types::{ConfigNode, CoreError};
use tracing::{debug, info, warn};

use super::action::{AdminAction, AdminRequest};
use crate::container::{CoreContainers, DEFAULT_ROLE};
use crate::cores::CoreDescriptor;
use crate::error::{AdminError, AdminResult};

pub struct CoreAdmin {
    containers: Weak<CoreContainers>,
    closed: AtomicBool,
    requests: AtomicU64,
}

impl CoreAdmin {
    pub fn new(containers: Weak<CoreContainers>) -> Self {
        info!("[admin] Core admin created");
        Self {
            containers,
            closed: AtomicBool::new(false),
            requests: AtomicU64::new(0),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Refuse further requests. Idempotent.
    pub fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!(requests = self.requests(), "[admin] Core admin shut down");
        }
    }

    fn containers(&self) -> AdminResult<Arc<CoreContainers>> {
        if self.is_closed() {
            return Err(AdminError::Unavailable);
        }
        self.containers.upgrade().ok_or(AdminError::Unavailable)
    }

    pub fn handle(&self, request: &AdminRequest) -> AdminResult<Json> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let result = self.dispatch(request);
        record_request("admin", result.is_ok());
        match &result {
            Ok(_) => debug!(action = %request.action, "[admin] Request handled"),
            Err(e) => warn!(action = %request.action, error = %e, "[admin] Request failed"),
        }
        result
    }

    fn dispatch(&self, request: &AdminRequest) -> AdminResult<Json> {
        let containers = self.containers()?;
        let cluster = containers.cluster();
        let secret = request.secret.as_deref();

        match request.action {
            AdminAction::Status => Ok(match request.param("core") {
                Some(name) => {
                    let core = containers
                        .get_core(name)
                        .ok_or_else(|| CoreError::NotFound(format!("core '{name}'")))?;
                    core.describe().to_json()
                }
                None => containers.status().to_json(),
            }),
            AdminAction::Reload => {
                let name = request.require("core")?;
                containers.container_of(name)?.reload(name)?;
                Ok(done(request.action, name))
            }
            AdminAction::Unload => {
                let name = request.require("core")?;
                containers.container_of(name)?.unload(name)?;
                Ok(done(request.action, name))
            }
            AdminAction::Swap => {
                let a = request.require("core")?;
                let b = request.require("other")?;
                let container = containers.container_of(a)?;
                if !container.knows(b) {
                    return Err(CoreError::NotFound(format!("core '{b}' in role '{}'", container.role())).into());
                }
                container.swap(a, b)?;
                Ok(done(request.action, a))
            }
            AdminAction::Rename => {
                let old = request.require("core")?;
                let new = request.require("other")?;
                containers.container_of(old)?.rename(old, new)?;
                Ok(done(request.action, new))
            }
            AdminAction::Create => {
                let descriptor = descriptor_from_request(request)?;
                let name = descriptor.name().to_string();
                containers
                    .add_container(descriptor.role())
                    .create(descriptor)?;
                Ok(done(request.action, &name))
            }
            AdminAction::Monitors => Ok(containers.monitors().snapshot().to_json()),
            AdminAction::Cluster => Ok(cluster.describe().to_json()),
            AdminAction::Ping => {
                let node = cluster.handle_ping(secret, request.cluster_id.as_deref())?;
                to_json(&node)
            }
            AdminAction::Join => {
                let caller: HostNode = decode_body(request)?;
                let hosts = cluster.handle_join(secret, caller)?;
                to_json(&hosts)
            }
            AdminAction::Attach => {
                let attach: AttachRequest = decode_body(request)?;
                let node = cluster.handle_attach(secret, attach)?;
                to_json(&node)
            }
            AdminAction::Hosts => {
                let mode = request
                    .param("mode")
                    .map(str::parse::<HostMode>)
                    .transpose()
                    .map_err(|message| ClusterError::Config {
                        context: "mode".into(),
                        message,
                    })?;
                let hosts = cluster.handle_hosts(secret, mode)?;
                to_json(&hosts)
            }
        }
    }
}

fn done(action: AdminAction, core: &str) -> Json {
    json!({ "action": action.as_str(), "core": core, "status": "OK" })
}

fn to_json<T: serde::Serialize>(value: &T) -> AdminResult<Json> {
    serde_json::to_value(value)
        .map_err(|e| CoreError::config("response", format!("encode failed: {e}")).into())
}

fn decode_body<T: DeserializeOwned>(request: &AdminRequest) -> AdminResult<T> {
    let body = request.body.clone().ok_or(AdminError::MissingParam("body"))?;
    serde_json::from_value(body).map_err(|e| {
        AdminError::from(CoreError::config(
            format!("{} body", request.action),
            format!("decode failed: {e}"),
        ))
    })
}

/// `CREATE` parameters: `core`, `role`, `instance_dir`, `data_dir`,
/// `config`, `factory`. A JSON body with a `plugins` array is used as the
/// core's inline configuration.
fn descriptor_from_request(request: &AdminRequest) -> AdminResult<CoreDescriptor> {
    let name = request.require("core")?;
    let role = request.param("role").unwrap_or(DEFAULT_ROLE);

    let mut entry = toml::Table::new();
    entry.insert("name".into(), toml::Value::String(name.to_string()));
    for key in ["instance_dir", "data_dir", "config", "factory"] {
        if let Some(value) = request.param(key) {
            entry.insert(key.into(), toml::Value::String(value.to_string()));
        }
    }
    if let Some(plugins) = request.body.as_ref().and_then(|b| b.get("plugins")) {
        let plugins: toml::Value = serde_json::from_value(plugins.clone())
            .map_err(|e| CoreError::config("CREATE body", format!("invalid plugins: {e}")))?;
        entry.insert("plugins".into(), plugins);
    }
    let text = toml::to_string(&entry)
        .map_err(|e| CoreError::config("CREATE", format!("encode failed: {e}")))?;
    let node = ConfigNode::parse("admin:CREATE", &text)?;
    let descriptor = CoreDescriptor::from_config(role, &node)?;
    Ok(descriptor)
}

impl std::fmt::Debug for CoreAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreAdmin")
            .field("closed", &self.is_closed())
            .field("requests", &self.requests())
            .finish()
    }
}
