//! The process-wide container set
//!
//! ## Shutdown Sequence
//!
//! Each phase is guarded; a failure is logged and the next phase still runs.
//!
//! | Phase | Action |
//! |-------|--------|
//! | 1 | Signal cancel, await outstanding jobs (bounded), abort stragglers |
//! | 2 | Cancel in-flight cluster fetches and wait for them to drain |
//! | 3 | Shut down every container (closes cores) |
//! | 4 | Shut down the admin handler |
//! | 5 | Close the cluster subsystem |
//! | 6 | Close the store |
//! | 7 | Clear the monitor registry |
//! | 8 | Release store filesystem handles |

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use ch_01_plugin_registry::MonitorRegistry;
use ch_02_core_lifecycle::RefHandle;
use ch_03_core_store::{CoreStore, StoreConfig};
use ch_04_core_cluster::{ClusterConfig, CoreCluster, Fetcher, ReqwestFetcher};
use core_telemetry::CORES_LOADED;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use shared_types::{ConfigNode, CoreError, CoreResult, NamedList};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::AdminConfig;
use super::core_container::CoreContainer;
use crate::admin::CoreAdmin;
use crate::context::ProcessContext;
use crate::cores::Core;

/// Global settings document loaded at `on_inited`.
pub const SETTINGS_DOC: &str = "settings";

/// Construction options that override the configuration tree.
#[derive(Default)]
pub struct ContainersOptions {
    /// Overrides `host.http_port`.
    pub http_port: Option<u16>,
    /// Transport for cluster traffic. Defaults to [`ReqwestFetcher`].
    pub fetcher: Option<Arc<dyn Fetcher>>,
}

pub struct CoreContainers {
    root: ConfigNode,
    admin_config: AdminConfig,
    ctx: Arc<ProcessContext>,
    containers: RwLock<BTreeMap<String, Arc<CoreContainer>>>,
    admin: OnceLock<Arc<CoreAdmin>>,
    settings: RwLock<NamedList>,
    jobs: Mutex<JoinSet<()>>,
    cancel_tx: watch::Sender<bool>,
    runtime: Handle,
    inited: AtomicBool,
    on_inited_done: AtomicBool,
    shut_down: AtomicBool,
}

impl CoreContainers {
    /// Build the store and cluster from `root`. Must be called from within
    /// a Tokio runtime.
    pub fn new(root: ConfigNode) -> CoreResult<Arc<Self>> {
        Self::with_options(root, ContainersOptions::default())
    }

    pub fn with_options(root: ConfigNode, options: ContainersOptions) -> CoreResult<Arc<Self>> {
        let runtime = Handle::try_current()
            .map_err(|e| CoreError::config("runtime", format!("no async runtime: {e}")))?;
        let admin_config = AdminConfig::from_config(&root)?;

        let store = Arc::new(CoreStore::new(StoreConfig::from_config(&root)?));

        let mut cluster_config = ClusterConfig::from_config(&root)?;
        if let Some(port) = options.http_port {
            cluster_config.identity.http_port = port;
        }
        let fetcher: Arc<dyn Fetcher> = match options.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(ReqwestFetcher::new(
                cluster_config.request_timeout,
                cluster_config.connect_timeout,
            )?),
        };
        let cluster = CoreCluster::new(cluster_config, fetcher)?;

        let (cancel_tx, _) = watch::channel(false);
        info!(
            roles = admin_config.roles.len(),
            default_core = %admin_config.default_core_name,
            "[runtime] Core containers created"
        );
        Ok(Arc::new(Self {
            ctx: Arc::new(ProcessContext::new(store, cluster)),
            root,
            admin_config,
            containers: RwLock::new(BTreeMap::new()),
            admin: OnceLock::new(),
            settings: RwLock::new(NamedList::new()),
            jobs: Mutex::new(JoinSet::new()),
            cancel_tx,
            runtime,
            inited: AtomicBool::new(false),
            on_inited_done: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        }))
    }

    pub fn admin_config(&self) -> &AdminConfig {
        &self.admin_config
    }

    pub fn context(&self) -> &Arc<ProcessContext> {
        &self.ctx
    }

    pub fn store(&self) -> &Arc<CoreStore> {
        self.ctx.store()
    }

    pub fn cluster(&self) -> &Arc<CoreCluster> {
        self.ctx.cluster()
    }

    pub fn monitors(&self) -> &Arc<MonitorRegistry> {
        self.ctx.monitors()
    }

    /// Global settings as loaded by [`Self::on_inited`].
    pub fn settings(&self) -> NamedList {
        self.settings.read().clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// The container for `role`, created on first request. The first
    /// container also brings up the admin handler.
    pub fn add_container(self: &Arc<Self>, role: &str) -> Arc<CoreContainer> {
        let container = {
            let mut containers = self.containers.write();
            Arc::clone(containers.entry(role.to_string()).or_insert_with(|| {
                debug!(role, "[runtime] Container added");
                Arc::new(CoreContainer::new(
                    role,
                    self.admin_config.default_core_name.clone(),
                    Arc::clone(&self.ctx),
                ))
            }))
        };
        self.admin
            .get_or_init(|| Arc::new(CoreAdmin::new(Arc::downgrade(self))));
        container
    }

    pub fn container(&self, role: &str) -> Option<Arc<CoreContainer>> {
        self.containers.read().get(role).cloned()
    }

    pub fn roles(&self) -> Vec<String> {
        self.containers.read().keys().cloned().collect()
    }

    fn all_containers(&self) -> Vec<Arc<CoreContainer>> {
        self.containers.read().values().cloned().collect()
    }

    /// `None` until the first container exists.
    pub fn admin(&self) -> Option<Arc<CoreAdmin>> {
        self.admin.get().cloned()
    }

    /// Create a container per configured role and load its cores. Valid
    /// once. Per-core failures are recorded by each container; the
    /// returned count is the number of cores registered.
    pub fn init(self: &Arc<Self>) -> CoreResult<usize> {
        if self.inited.swap(true, Ordering::AcqRel) {
            return Err(CoreError::contract("containers", "already initialized"));
        }
        let mut loaded = 0;
        for role in self.admin_config.effective_roles() {
            loaded += self.add_container(&role).init(&self.root)?;
        }
        CORES_LOADED.set(self.core_count() as i64);
        info!(loaded, "[runtime] Containers initialized");
        Ok(loaded)
    }

    /// Load global settings, publish every container and join the
    /// cluster. Valid once.
    pub async fn on_inited(self: &Arc<Self>) -> CoreResult<()> {
        if self.on_inited_done.swap(true, Ordering::AcqRel) {
            return Err(CoreError::contract("containers", "on_inited already ran"));
        }

        match self.store().load_global(SETTINGS_DOC).await {
            Ok(settings) => {
                debug!(entries = settings.len(), "[runtime] Global settings loaded");
                *self.settings.write() = settings;
            }
            Err(e) => error!(error = %e, "[runtime] Failed to load global settings"),
        }

        for container in self.all_containers() {
            if let Err(e) = container.on_inited() {
                warn!(role = %container.role(), error = %e, "[runtime] Container on_inited failed");
            }
        }

        match self.cluster().join_host().await {
            Ok(true) => info!("[runtime] Cluster join started"),
            Ok(false) => debug!("[runtime] No cluster join configured"),
            Err(e) => error!(error = %e, "[runtime] Cluster join failed"),
        }
        Ok(())
    }

    /// Persist `settings` as the global settings document.
    pub async fn save_settings(&self, settings: NamedList) -> CoreResult<()> {
        self.store().save_global(SETTINGS_DOC, &settings).await?;
        *self.settings.write() = settings;
        Ok(())
    }

    /// Track an async job. It receives the shutdown signal and is awaited
    /// (then aborted) during shutdown. Returns the job id.
    pub fn spawn<F, Fut>(&self, name: &str, job: F) -> CoreResult<String>
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_shut_down() {
            return Err(CoreError::contract("containers", format!("spawn '{name}' after shutdown")));
        }
        let id = Uuid::new_v4().to_string();
        let fut = job(self.cancel_tx.subscribe());
        let (job_id, job_name) = (id.clone(), name.to_string());
        self.jobs.lock().spawn_on(
            async move {
                fut.await;
                debug!(job = %job_name, id = %job_id, "[runtime] Job finished");
            },
            &self.runtime,
        );
        debug!(job = %name, id = %id, "[runtime] Job spawned");
        Ok(id)
    }

    pub fn outstanding_jobs(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Open a reference to `name` in the first container that has it.
    pub fn get_core(&self, name: &str) -> Option<RefHandle<Core>> {
        self.all_containers()
            .into_iter()
            .find_map(|container| container.get_core(name))
    }

    /// The container that registered or declared `name`.
    pub fn container_of(&self, name: &str) -> CoreResult<Arc<CoreContainer>> {
        self.all_containers()
            .into_iter()
            .find(|container| container.knows(name))
            .ok_or_else(|| CoreError::NotFound(format!("core '{name}'")))
    }

    pub fn core_count(&self) -> usize {
        self.all_containers()
            .iter()
            .map(|c| c.core_names().len())
            .sum()
    }

    pub fn status(&self) -> NamedList {
        let containers: NamedList = self
            .all_containers()
            .iter()
            .map(|c| (c.role().to_string(), c.status()))
            .collect();
        let mut status = NamedList::new()
            .with("default_core", self.admin_config.default_core_name.as_str())
            .with("containers", containers)
            .with("store", self.store().describe())
            .with("jobs", self.outstanding_jobs());
        if let Some(lib) = &self.admin_config.lib_path {
            status.add("lib_path", lib.display().to_string());
        }
        status
    }

    /// Ordered shutdown. Idempotent.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let timeout = self.admin_config.shutdown_timeout;
        info!(timeout_ms = timeout.as_millis() as u64, "[runtime] Shutdown started");

        let jobs = async {
            self.cancel_tx.send_replace(true);
            let mut jobs = std::mem::take(&mut *self.jobs.lock());
            let pending = jobs.len();
            let drained = tokio::time::timeout(timeout, async {
                while jobs.join_next().await.is_some() {}
            })
            .await;
            if drained.is_err() {
                warn!(pending = jobs.len(), "[runtime] Jobs did not finish in time, aborting");
                jobs.abort_all();
            }
            debug!(pending, "[runtime] Jobs drained");
        };
        guarded_async(1, "jobs", jobs).await;

        let cluster = Arc::clone(self.cluster());
        let drain = async move {
            cluster.cancel_in_flight();
            if !cluster.wait_idle(timeout).await {
                warn!("[runtime] Cluster fetches still running after cancel");
            }
        };
        guarded_async(2, "network", drain).await;

        guarded(3, "containers", || {
            for container in self.all_containers() {
                container.shutdown();
            }
        });
        guarded(4, "admin", || {
            if let Some(admin) = self.admin.get() {
                admin.shutdown();
            }
        });
        guarded(5, "cluster", || self.cluster().close());
        guarded(6, "store", || self.store().close());
        guarded(7, "monitors", || self.monitors().clear());
        guarded(8, "store handles", || {
            let released = self.store().release_handles();
            debug!(released, "[runtime] Store handles released");
        });

        CORES_LOADED.set(0);
        info!("[runtime] Shutdown complete");
    }
}

fn guarded(phase: u8, name: &str, step: impl FnOnce()) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(step)) {
        error!(phase, step = name, panic = %panic_message(&*panic), "[runtime] Shutdown phase failed");
    }
}

async fn guarded_async(phase: u8, name: &str, step: impl Future<Output = ()>) {
    if let Err(panic) = AssertUnwindSafe(step).catch_unwind().await {
        error!(phase, step = name, panic = %panic_message(&*panic), "[runtime] Shutdown phase failed");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl Drop for CoreContainers {
    fn drop(&mut self) {
        if !self.is_shut_down() {
            warn!("[runtime] Core containers dropped without shutdown");
        }
    }
}
