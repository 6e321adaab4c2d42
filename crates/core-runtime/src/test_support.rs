//! Fixtures shared by the runtime's unit tests.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use ch_03_core_store::{CoreStore, StoreConfig};
use ch_04_core_cluster::{ClusterConfig, ClusterError, CoreCluster, Fetcher, Headers};
use parking_lot::Mutex;
use serde_json::Value;
use shared_types::ConfigNode;

use crate::container::{ContainersOptions, CoreContainers};
use crate::context::ProcessContext;

/// Records every URL and fails every request, so nothing leaves the
/// process.
#[derive(Default)]
pub(crate) struct OfflineFetcher {
    calls: Mutex<Vec<String>>,
}

impl OfflineFetcher {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn refuse(&self, url: &str) -> Result<String, ClusterError> {
        self.calls.lock().push(url.to_string());
        Err(ClusterError::Http {
            url: url.to_string(),
            message: "offline".into(),
        })
    }
}

#[async_trait]
impl Fetcher for OfflineFetcher {
    async fn get(&self, url: &str, _headers: &Headers) -> Result<String, ClusterError> {
        self.refuse(url)
    }

    async fn post_json(&self, url: &str, _body: &Value, _headers: &Headers) -> Result<String, ClusterError> {
        self.refuse(url)
    }
}

/// Host configuration rooted at `dir`, with `body` appended.
pub(crate) fn host_config(dir: &Path, body: &str) -> ConfigNode {
    let text = format!(
        "[store]\nlocal_dir = {:?}\n\n{body}",
        dir.join("store").display().to_string()
    );
    ConfigNode::parse("host.toml", &text).unwrap()
}

/// A process context over a local store in `dir` and an offline cluster.
/// Requires a Tokio runtime.
pub(crate) fn context(dir: &Path) -> Arc<ProcessContext> {
    let root = host_config(dir, "");
    let store = Arc::new(CoreStore::new(StoreConfig::from_config(&root).unwrap()));
    let cluster = CoreCluster::new(ClusterConfig::default(), OfflineFetcher::new()).unwrap();
    Arc::new(ProcessContext::new(store, cluster))
}

/// Containers over `body`, wired to an offline fetcher. Not initialized.
pub(crate) fn containers(dir: &Path, body: &str) -> Arc<CoreContainers> {
    let options = ContainersOptions {
        http_port: Some(18983),
        fetcher: Some(OfflineFetcher::new()),
    };
    CoreContainers::with_options(host_config(dir, body), options).unwrap()
}

/// A `[[roles.<role>.cores]]` entry with `ping` as default handler plus
/// `/echo` and `/stats`.
pub(crate) fn core_entry(role: &str, name: &str) -> String {
    format!(
        r#"
[[roles.{role}.cores]]
name = "{name}"

[[roles.{role}.cores.plugins]]
name = "/ping"
class = "ping"
default = true

[[roles.{role}.cores.plugins]]
name = "/echo"
class = "echo"

[[roles.{role}.cores.plugins]]
name = "/stats"
class = "stats"
"#
    )
}
