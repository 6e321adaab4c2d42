//! # Core Cluster Service
//!
//! Owns the local host identity and the host registry. Probes, handshakes
//! and fetches are spawned onto the runtime captured at construction and
//! return to the caller immediately.
//!
//! The registry lock is never held across network I/O: a mutation takes
//! the lock, records the change, releases it, and only then dispatches.

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::NamedList;
use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, warn};

use crate::domain::{
    address_url, now_millis, parse_address, ClusterConfig, HostKey, HostMode, HostNode, HostRegistry,
    HostSelf, HostState, Upsert,
};
use crate::error::{ClusterError, ClusterResult};
use crate::ports::{FetchListener, Fetcher, Headers};

pub const SECRET_HEADER: &str = "X-Cluster-Secret";
pub const CLUSTER_ID_HEADER: &str = "X-Cluster-Id";

pub const PING_PATH: &str = "/admin/cluster/ping";
pub const JOIN_PATH: &str = "/admin/cluster/join";
pub const ATTACH_PATH: &str = "/admin/cluster/attach";
pub const HOSTS_PATH: &str = "/admin/cluster/hosts";

/// Body of an attach handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachRequest {
    pub caller: HostNode,
    /// Callers the attaching host itself allows.
    #[serde(default)]
    pub allow: Vec<String>,
}

/// Counters exposed to monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterStats {
    pub hosts: usize,
    pub probes_sent: u64,
    pub probe_failures: u64,
    pub fetch_failures: u64,
    pub in_flight: usize,
}

#[derive(Default)]
struct Counters {
    probes_sent: AtomicU64,
    probe_failures: AtomicU64,
    fetch_failures: AtomicU64,
}

/// Cluster membership subsystem.
pub struct CoreCluster {
    config: ClusterConfig,
    host_self: HostSelf,
    registry: RwLock<HostRegistry>,
    /// Allow-lists registered by attached hosts, keyed by their host key.
    attach_grants: RwLock<BTreeMap<HostKey, Vec<String>>>,
    fetcher: Arc<dyn Fetcher>,
    runtime: Handle,
    cancel_tx: watch::Sender<bool>,
    closed: AtomicBool,
    in_flight: AtomicUsize,
    idle: Notify,
    counters: Counters,
}

impl CoreCluster {
    /// Build the subsystem and register the local host. Must be called
    /// from within a Tokio runtime.
    pub fn new(config: ClusterConfig, fetcher: Arc<dyn Fetcher>) -> ClusterResult<Arc<Self>> {
        let runtime = Handle::try_current().map_err(|e| ClusterError::Config {
            context: "cluster".into(),
            message: format!("no async runtime: {e}"),
        })?;
        let host_self = config.host_self();
        let (cancel_tx, _) = watch::channel(false);

        info!(
            cluster = %config.cluster_id,
            host = %host_self.key(),
            mode = %host_self.node.mode,
            url = %host_self.node.base_url(),
            "[ch-04] Core cluster created"
        );

        Ok(Arc::new(Self {
            registry: RwLock::new(HostRegistry::new(host_self.node.clone())),
            host_self,
            config,
            attach_grants: RwLock::new(BTreeMap::new()),
            fetcher,
            runtime,
            cancel_tx,
            closed: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
            counters: Counters::default(),
        }))
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn cluster_id(&self) -> &str {
        &self.config.cluster_id
    }

    pub fn self_key(&self) -> &HostKey {
        self.host_self.key()
    }

    /// The local host record with a fresh heartbeat.
    pub fn self_node(&self) -> HostNode {
        let mut node = self
            .registry
            .read()
            .local()
            .cloned()
            .unwrap_or_else(|| self.host_self.node.clone());
        node.heartbeat = now_millis();
        node
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> ClusterResult<()> {
        if self.is_closed() {
            Err(ClusterError::Closed)
        } else {
            Ok(())
        }
    }

    fn handshake_headers(&self) -> Headers {
        let mut headers = vec![(CLUSTER_ID_HEADER, self.config.cluster_id.clone())];
        if let Some(secret) = &self.config.secret {
            headers.push((SECRET_HEADER, secret.clone()));
        }
        headers
    }

    /// Run `work` on the runtime, racing it against cancellation, then hand
    /// the result to `done`. `done` runs exactly once.
    fn spawn_tracked<T, F, C>(self: &Arc<Self>, work: F, done: C)
    where
        T: Send + 'static,
        F: Future<Output = ClusterResult<T>> + Send + 'static,
        C: FnOnce(&Arc<Self>, ClusterResult<T>) + Send + 'static,
    {
        let mut cancel = self.cancel_tx.subscribe();
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let this = Arc::clone(self);
        self.runtime.spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancel.wait_for(|cancelled| *cancelled) => Err(ClusterError::Cancelled),
                result = work => result,
            };
            if catch_unwind(AssertUnwindSafe(|| done(&this, result))).is_err() {
                error!("[ch-04] Completion callback panicked");
            }
            if this.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
                this.idle.notify_waiters();
            }
        });
    }

    /// Insert or refresh a host and probe it. Returns `true` when the host
    /// was not known before. Each call sends exactly one probe; the local
    /// host is never probed.
    pub fn add_host(self: &Arc<Self>, node: HostNode) -> ClusterResult<bool> {
        self.ensure_open()?;
        if node.cluster_id != self.config.cluster_id {
            return Err(ClusterError::ForeignCluster {
                expected: self.config.cluster_id.clone(),
                actual: node.cluster_id,
            });
        }
        if !node.is_consistent() {
            return Err(ClusterError::Forbidden(format!(
                "host key {} does not match its identity",
                node.key
            )));
        }
        if &node.key == self.self_key() {
            debug!("[ch-04] Ignoring add of the local host");
            return Ok(false);
        }

        let key = node.key.clone();
        let url = format!("{}{PING_PATH}", node.base_url());
        let outcome = {
            let mut registry = self.registry.write();
            let outcome = registry.upsert(node);
            // A stale record leaves the stored liveness alone; the ping
            // below still refreshes it.
            if outcome != Upsert::Stale {
                registry.set_state(&key, HostState::Pinged);
            }
            outcome
        };
        debug!(host = %key, ?outcome, "[ch-04] Host added");

        self.counters.probes_sent.fetch_add(1, Ordering::AcqRel);
        let fetcher = Arc::clone(&self.fetcher);
        let headers = self.handshake_headers();
        self.spawn_tracked(
            async move { fetcher.get(&url, &headers).await },
            move |this, result| this.finish_probe(&key, result),
        );
        Ok(outcome == Upsert::Inserted)
    }

    fn finish_probe(&self, key: &HostKey, result: ClusterResult<String>) {
        match result {
            Ok(_) => {
                self.registry.write().set_state(key, HostState::Known);
                debug!(host = %key, "[ch-04] Host answered probe");
            }
            Err(ClusterError::Cancelled) => {
                debug!(host = %key, "[ch-04] Probe cancelled");
            }
            Err(e) => {
                self.counters.probe_failures.fetch_add(1, Ordering::AcqRel);
                self.registry.write().set_state(key, HostState::Unknown);
                warn!(host = %key, error = %e, "[ch-04] Probe failed");
            }
        }
    }

    fn add_discovered(self: &Arc<Self>, hosts: Vec<HostNode>) {
        for node in hosts {
            let key = node.key.clone();
            if let Err(e) = self.add_host(node) {
                warn!(host = %key, error = %e, "[ch-04] Discovered host rejected");
            }
        }
    }

    /// Enter the cluster through the configured attach or join address.
    ///
    /// Returns `Ok(false)` without dispatching when no address is
    /// configured or when the address resolves to this host (see
    /// [`HostIdentity::resolves_to_self`](crate::HostIdentity::resolves_to_self)).
    pub async fn join_host(self: &Arc<Self>) -> ClusterResult<bool> {
        self.ensure_open()?;
        let (target, attach) = match (&self.host_self.attach_address, &self.host_self.join_address) {
            (Some(address), _) => (address.clone(), true),
            (None, Some(address)) => (address.clone(), false),
            (None, None) => {
                debug!("[ch-04] No join or attach address configured");
                return Ok(false);
            }
        };

        let port = self.config.identity.http_port;
        let invalid = || ClusterError::Config {
            context: if attach {
                "cluster.attach_address".into()
            } else {
                "cluster.join_address".into()
            },
            message: format!("invalid address '{target}'"),
        };
        let (host, target_port) = parse_address(&target, port).ok_or_else(invalid)?;
        if self.config.identity.resolves_to_self(&host, target_port).await {
            warn!(address = %target, "[ch-04] Refusing to join own identity");
            return Ok(false);
        }
        let base = address_url(&target, port).ok_or_else(invalid)?;

        let fetcher = Arc::clone(&self.fetcher);
        let headers = self.handshake_headers();
        let local = self.self_node();

        if attach {
            let request = AttachRequest {
                caller: local,
                allow: self.host_self.attach_allow.clone(),
            };
            info!(target = %base, "[ch-04] Attaching");
            self.spawn_tracked(
                async move {
                    let body = serde_json::to_value(&request).map_err(|e| ClusterError::Decode {
                        url: base.clone(),
                        message: e.to_string(),
                    })?;
                    let attach_url = format!("{base}{ATTACH_PATH}");
                    let reply = fetcher.post_json(&attach_url, &body, &headers).await?;
                    let target: HostNode = decode(&attach_url, &reply)?;
                    let hosts_url = format!("{base}{HOSTS_PATH}?mode=attach");
                    let reply = fetcher.get(&hosts_url, &headers).await?;
                    let mut hosts: Vec<HostNode> = decode(&hosts_url, &reply)?;
                    hosts.insert(0, target);
                    Ok(hosts)
                },
                |this, result| this.finish_handshake("attach", result),
            );
        } else {
            info!(target = %base, "[ch-04] Joining");
            self.spawn_tracked(
                async move {
                    let body = serde_json::to_value(&local).map_err(|e| ClusterError::Decode {
                        url: base.clone(),
                        message: e.to_string(),
                    })?;
                    let join_url = format!("{base}{JOIN_PATH}");
                    let reply = fetcher.post_json(&join_url, &body, &headers).await?;
                    decode::<Vec<HostNode>>(&join_url, &reply)
                },
                |this, result| this.finish_handshake("join", result),
            );
        }
        Ok(true)
    }

    fn finish_handshake(self: &Arc<Self>, kind: &'static str, result: ClusterResult<Vec<HostNode>>) {
        match result {
            Ok(hosts) => {
                info!(kind, peers = hosts.len(), "[ch-04] Handshake complete");
                self.add_discovered(hosts);
            }
            Err(ClusterError::Cancelled) => debug!(kind, "[ch-04] Handshake cancelled"),
            Err(e) => warn!(kind, error = %e, "[ch-04] Handshake failed"),
        }
    }

    /// GET `uri` asynchronously. The listener receives the body or the
    /// failure exactly once; a closed cluster delivers
    /// [`ClusterError::Closed`] immediately.
    pub fn fetch<L: FetchListener>(self: &Arc<Self>, uri: impl Into<String>, listener: L) {
        let uri = uri.into();
        let listener: Box<dyn FetchListener> = Box::new(listener);
        if self.is_closed() {
            listener.on_fetch(&uri, Err(ClusterError::Closed));
            return;
        }
        let fetcher = Arc::clone(&self.fetcher);
        let target = uri.clone();
        self.spawn_tracked(
            async move { fetcher.get(&target, &Headers::new()).await },
            move |this, result| {
                if let Err(e) = &result {
                    if !matches!(e, ClusterError::Cancelled) {
                        this.counters.fetch_failures.fetch_add(1, Ordering::AcqRel);
                    }
                    debug!(uri = %uri, error = %e, "[ch-04] Fetch failed");
                }
                listener.on_fetch(&uri, result);
            },
        );
    }

    pub fn get_cluster(&self, key: &HostKey) -> Option<HostNode> {
        self.registry.read().get(key).cloned()
    }

    /// Every known host, the local one included.
    pub fn get_clusters(&self) -> Vec<HostNode> {
        self.registry.read().snapshot()
    }

    pub fn hosts_in_state(&self, state: HostState) -> Vec<HostNode> {
        self.registry.read().in_state(state)
    }

    /// Forget a peer. The local host cannot be removed.
    pub fn remove_host(&self, key: &HostKey) -> Option<HostNode> {
        let removed = self.registry.write().remove(key);
        if removed.is_some() {
            self.attach_grants.write().remove(key);
            info!(host = %key, "[ch-04] Host removed");
        }
        removed
    }

    /// Whether `caller` may attach. An empty allow-list admits everyone;
    /// `*` is a wildcard entry.
    pub fn is_attach_allowed(&self, caller: &str) -> bool {
        let allow = &self.host_self.attach_allow;
        allow.is_empty()
            || allow
                .iter()
                .any(|entry| entry == "*" || entry.eq_ignore_ascii_case(caller))
    }

    /// Allow-list an attached host registered during its handshake.
    pub fn attach_grant(&self, key: &HostKey) -> Option<Vec<String>> {
        self.attach_grants.read().get(key).cloned()
    }

    /// Check the shared secret presented on an incoming handshake.
    pub fn verify_secret(&self, presented: Option<&str>) -> ClusterResult<()> {
        match &self.config.secret {
            Some(secret) if presented != Some(secret.as_str()) => Err(ClusterError::Forbidden(
                "missing or wrong cluster secret".into(),
            )),
            _ => Ok(()),
        }
    }

    fn verify_cluster_id(&self, presented: Option<&str>) -> ClusterResult<()> {
        match presented {
            Some(id) if id != self.config.cluster_id => Err(ClusterError::ForeignCluster {
                expected: self.config.cluster_id.clone(),
                actual: id.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// `GET /admin/cluster/ping`: the local host record.
    pub fn handle_ping(&self, secret: Option<&str>, cluster_id: Option<&str>) -> ClusterResult<HostNode> {
        self.ensure_open()?;
        self.verify_secret(secret)?;
        self.verify_cluster_id(cluster_id)?;
        Ok(self.self_node())
    }

    /// `POST /admin/cluster/join`: add the caller and return every host
    /// known here.
    pub fn handle_join(self: &Arc<Self>, secret: Option<&str>, caller: HostNode) -> ClusterResult<Vec<HostNode>> {
        self.verify_secret(secret)?;
        let name = caller.identity.name.clone();
        self.add_host(caller)?;
        info!(caller = %name, "[ch-04] Host joined");
        let mut hosts = self.get_clusters();
        let local = self.self_node();
        if let Some(entry) = hosts.iter_mut().find(|h| h.key == local.key) {
            *entry = local;
        }
        Ok(hosts)
    }

    /// `POST /admin/cluster/attach`: admit an allow-listed caller in attach
    /// mode and return the local host record.
    pub fn handle_attach(self: &Arc<Self>, secret: Option<&str>, request: AttachRequest) -> ClusterResult<HostNode> {
        self.verify_secret(secret)?;
        let AttachRequest { mut caller, allow } = request;
        let identity = &caller.identity;
        let admitted = [&identity.name, &identity.lan_address, &identity.public_address]
            .into_iter()
            .filter(|a| !a.is_empty())
            .any(|a| self.is_attach_allowed(a))
            || self.is_attach_allowed(caller.key.as_str());
        if !admitted {
            warn!(caller = %identity.name, "[ch-04] Attach refused");
            return Err(ClusterError::Forbidden(format!(
                "host '{}' is not allowed to attach",
                identity.name
            )));
        }

        caller.mode = HostMode::Attach;
        let key = caller.key.clone();
        self.add_host(caller)?;
        self.attach_grants.write().insert(key.clone(), allow);
        info!(caller = %key, "[ch-04] Host attached");
        Ok(self.self_node())
    }

    /// `GET /admin/cluster/hosts[?mode=...]`.
    pub fn handle_hosts(&self, secret: Option<&str>, mode: Option<HostMode>) -> ClusterResult<Vec<HostNode>> {
        self.ensure_open()?;
        self.verify_secret(secret)?;
        Ok(self
            .get_clusters()
            .into_iter()
            .filter(|h| mode.map_or(true, |m| h.mode == m))
            .collect())
    }

    pub fn stats(&self) -> ClusterStats {
        ClusterStats {
            hosts: self.registry.read().len(),
            probes_sent: self.counters.probes_sent.load(Ordering::Acquire),
            probe_failures: self.counters.probe_failures.load(Ordering::Acquire),
            fetch_failures: self.counters.fetch_failures.load(Ordering::Acquire),
            in_flight: self.in_flight.load(Ordering::Acquire),
        }
    }

    /// Registry snapshot for the admin `CLUSTER` action.
    pub fn describe(&self) -> NamedList {
        let hosts: NamedList = self
            .get_clusters()
            .into_iter()
            .map(|h| {
                let entry = NamedList::new()
                    .with("name", h.identity.name.as_str())
                    .with("url", h.base_url())
                    .with("hash", h.hash)
                    .with("mode", h.mode.to_string())
                    .with("state", h.state.to_string())
                    .with("heartbeat", h.heartbeat);
                (h.key.to_string(), entry)
            })
            .collect();
        let stats = self.stats();
        NamedList::new()
            .with("cluster_id", self.config.cluster_id.as_str())
            .with("self", self.self_key().to_string())
            .with("probes_sent", stats.probes_sent)
            .with("probe_failures", stats.probe_failures)
            .with("fetch_failures", stats.fetch_failures)
            .with("hosts", hosts)
    }

    /// Wait until no probe, handshake or fetch is running. Returns `false`
    /// if `timeout` elapsed first.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.idle.notified();
                if self.in_flight.load(Ordering::Acquire) == 0 {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }

    /// Cancel every in-flight task. Work dispatched afterwards is
    /// cancelled as soon as it starts.
    pub fn cancel_in_flight(&self) {
        let running = self.in_flight.load(Ordering::Acquire);
        self.cancel_tx.send_replace(true);
        debug!(running, "[ch-04] In-flight work cancelled");
    }

    /// Cancel in-flight work and refuse new work. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel_in_flight();
        let peers = {
            let mut registry = self.registry.write();
            let peers: Vec<HostKey> = registry.peers().into_iter().map(|p| p.key).collect();
            for key in &peers {
                registry.remove(key);
            }
            peers.len()
        };
        self.attach_grants.write().clear();
        info!(peers, "[ch-04] Core cluster closed");
    }
}

fn decode<T: serde::de::DeserializeOwned>(url: &str, body: &str) -> ClusterResult<T> {
    serde_json::from_str(body).map_err(|e| ClusterError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

impl std::fmt::Debug for CoreCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreCluster")
            .field("cluster_id", &self.config.cluster_id)
            .field("self", self.self_key())
            .field("closed", &self.is_closed())
            .finish()
    }
}
