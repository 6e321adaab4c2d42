//! # Core Store Service
//!
//! Resolves store URIs to filesystem handles, owns the store list, persists
//! documents and hands out local working directories.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use shared_types::{ConfigNode, CoreResult, NamedList};
use tracing::{debug, info, warn};

use crate::adapters::{LocalStoreFs, WebHdfsStoreFs};
use crate::domain::{
    decode_document, encode_document, global_path, split_authority, user_dir_path, user_path,
    StoreUri, UserCategory,
};
use crate::error::{StoreError, StoreResult};
use crate::ports::StoreFs;
use crate::store_info::{StoreInfo, CAPACITY_TTL};

/// Store configuration (`[store]` section).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root of the default local store and of the working directories.
    pub local_dir: PathBuf,
    /// Configured backing stores. Empty means "local only".
    pub uris: Vec<String>,
    /// HDFS user for distributed stores.
    pub dfs_user: Option<String>,
    /// `host[:port]` used by `dfs:` URIs that name no namenode.
    pub dfs_namenode: Option<String>,
    pub capacity_ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            local_dir: PathBuf::from("store"),
            uris: Vec::new(),
            dfs_user: None,
            dfs_namenode: None,
            capacity_ttl: CAPACITY_TTL,
        }
    }
}

impl StoreConfig {
    pub fn new(local_dir: impl Into<PathBuf>) -> Self {
        Self {
            local_dir: local_dir.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_uris(mut self, uris: Vec<String>) -> Self {
        self.uris = uris;
        self
    }

    #[must_use]
    pub fn with_dfs_namenode(mut self, namenode: impl Into<String>) -> Self {
        self.dfs_namenode = Some(namenode.into());
        self
    }

    /// Parse `uri` against the configured default namenode.
    pub fn parse_uri(&self, uri: &str) -> StoreResult<StoreUri> {
        StoreUri::parse_with_namenode(uri, self.dfs_namenode.as_deref())
    }

    /// Read `store.local_dir`, `store.uris`, `store.dfs_user`,
    /// `store.dfs_namenode` and `store.capacity_ttl_secs`. Every URI is
    /// validated here.
    pub fn from_config(root: &ConfigNode) -> CoreResult<Self> {
        let defaults = Self::default();
        let config = Self {
            local_dir: root
                .get_str("store.local_dir")
                .map(PathBuf::from)
                .unwrap_or(defaults.local_dir),
            uris: root.get_str_list("store.uris"),
            dfs_user: root.get_str("store.dfs_user").map(str::to_string),
            dfs_namenode: root.get_str("store.dfs_namenode").map(str::to_string),
            capacity_ttl: root
                .get_i64("store.capacity_ttl_secs")
                .and_then(|s| u64::try_from(s).ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.capacity_ttl),
        };
        if let Some(namenode) = &config.dfs_namenode {
            split_authority(namenode, namenode.trim())?;
        }
        for uri in &config.uris {
            config.parse_uri(uri)?;
        }
        Ok(config)
    }
}

const DATA_DIR: &str = "data";
const CACHE_DIR: &str = "cache";
const TEMP_DIR: &str = "tmp";

/// Storage subsystem shared by every core.
pub struct CoreStore {
    config: StoreConfig,
    default_fs: Arc<LocalStoreFs>,
    handles: RwLock<HashMap<StoreUri, Arc<dyn StoreFs>>>,
    infos: Mutex<Option<Vec<Arc<StoreInfo>>>>,
    closed: AtomicBool,
}

impl CoreStore {
    pub fn new(config: StoreConfig) -> Self {
        info!(
            local_dir = %config.local_dir.display(),
            stores = config.uris.len(),
            "[ch-03] Core store created"
        );
        Self {
            default_fs: Arc::new(LocalStoreFs::new(config.local_dir.clone())),
            config,
            handles: RwLock::new(HashMap::new()),
            infos: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn local_dir(&self) -> &Path {
        &self.config.local_dir
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    /// Filesystem handle for a store URI. Handles are cached per URI.
    pub fn get_store_fs(&self, uri: &str) -> StoreResult<Arc<dyn StoreFs>> {
        self.ensure_open()?;
        let parsed = self.config.parse_uri(uri)?;

        let is_default = match &parsed {
            StoreUri::Default => true,
            StoreUri::Local { path } => path == &self.config.local_dir,
            StoreUri::Distributed { .. } => false,
        };
        if is_default {
            return Ok(Arc::clone(&self.default_fs) as Arc<dyn StoreFs>);
        }

        if let Some(fs) = self.handles.read().get(&parsed) {
            return Ok(Arc::clone(fs));
        }

        let fs: Arc<dyn StoreFs> = match &parsed {
            StoreUri::Local { path } => Arc::new(LocalStoreFs::new(path.clone())),
            StoreUri::Distributed { host, port, path } => {
                let mut dfs = WebHdfsStoreFs::new(host.clone(), *port, path.clone())?;
                if let Some(user) = &self.config.dfs_user {
                    dfs = dfs.with_user(user.clone());
                }
                Arc::new(dfs)
            }
            StoreUri::Default => Arc::clone(&self.default_fs) as Arc<dyn StoreFs>,
        };
        debug!(uri = %parsed, "[ch-03] Store handle opened");

        let mut handles = self.handles.write();
        Ok(Arc::clone(handles.entry(parsed).or_insert(fs)))
    }

    /// Configured stores, built on first call and cached for the life of
    /// the store. With no URIs configured this is a single local entry
    /// rooted at `local_dir`.
    pub fn get_store_infos(&self) -> StoreResult<Vec<Arc<StoreInfo>>> {
        self.ensure_open()?;
        let mut infos = self.infos.lock();
        if let Some(existing) = infos.as_ref() {
            return Ok(existing.clone());
        }

        let built: Vec<Arc<StoreInfo>> = if self.config.uris.is_empty() {
            vec![Arc::new(StoreInfo::with_ttl(
                "local",
                Arc::clone(&self.default_fs) as Arc<dyn StoreFs>,
                self.config.capacity_ttl,
            ))]
        } else {
            self.config
                .uris
                .iter()
                .enumerate()
                .map(|(idx, uri)| -> StoreResult<Arc<StoreInfo>> {
                    let fs = self.get_store_fs(uri)?;
                    let name = format!("{}-{idx}", fs.scheme());
                    Ok(Arc::new(StoreInfo::with_ttl(name, fs, self.config.capacity_ttl)))
                })
                .collect::<StoreResult<_>>()?
        };

        info!(count = built.len(), "[ch-03] Store infos resolved");
        *infos = Some(built.clone());
        Ok(built)
    }

    /// Filesystem that holds documents: the first configured store.
    pub fn document_fs(&self) -> StoreResult<Arc<dyn StoreFs>> {
        let infos = self.get_store_infos()?;
        Ok(infos
            .first()
            .map(|info| Arc::clone(info.fs()))
            .unwrap_or_else(|| Arc::clone(&self.default_fs) as Arc<dyn StoreFs>))
    }

    async fn load_document(&self, path: &str) -> StoreResult<NamedList> {
        let fs = self.document_fs()?;
        match fs.read(path).await? {
            None => Ok(NamedList::new()),
            Some(bytes) => decode_document(path, &bytes),
        }
    }

    async fn save_document(&self, path: &str, doc: &NamedList) -> StoreResult<()> {
        let fs = self.document_fs()?;
        let bytes = encode_document(path, doc)?;
        fs.write(path, &bytes).await?;
        debug!(path, entries = doc.len(), "[ch-03] Document saved");
        Ok(())
    }

    /// Load a global document. Never-saved documents load as empty.
    pub async fn load_global(&self, name: &str) -> StoreResult<NamedList> {
        self.load_document(&global_path(name)?).await
    }

    pub async fn save_global(&self, name: &str, doc: &NamedList) -> StoreResult<()> {
        self.save_document(&global_path(name)?, doc).await
    }

    /// Load a per-user document. Never-saved documents load as empty.
    pub async fn load_user(&self, user: &str, category: UserCategory) -> StoreResult<NamedList> {
        self.load_document(&user_path(user, category)?).await
    }

    pub async fn save_user(
        &self,
        user: &str,
        category: UserCategory,
        doc: &NamedList,
    ) -> StoreResult<()> {
        self.save_document(&user_path(user, category)?, doc).await
    }

    /// Delete all of a user's documents.
    pub async fn delete_user(&self, user: &str) -> StoreResult<bool> {
        let fs = self.document_fs()?;
        fs.delete(&user_dir_path(user)?).await
    }

    fn ensure_dir(&self, relative: &str) -> StoreResult<PathBuf> {
        self.ensure_open()?;
        let dir = self.default_fs.resolve(relative)?;
        std::fs::create_dir_all(&dir)
            .map_err(|e| StoreError::io(dir.display().to_string(), e))?;
        Ok(dir)
    }

    /// `<local_dir>/data`, created on demand.
    pub fn data_dir(&self) -> StoreResult<PathBuf> {
        self.ensure_dir(DATA_DIR)
    }

    /// `<local_dir>/users/<user>`, created on demand.
    pub fn user_dir(&self, user: &str) -> StoreResult<PathBuf> {
        self.ensure_dir(&user_dir_path(user)?)
    }

    /// `<local_dir>/cache`, created on demand.
    pub fn cache_dir(&self) -> StoreResult<PathBuf> {
        self.ensure_dir(CACHE_DIR)
    }

    /// `<local_dir>/tmp`, created on demand.
    pub fn temp_dir(&self) -> StoreResult<PathBuf> {
        self.ensure_dir(TEMP_DIR)
    }

    /// Descriptors of every resolved store, without probing capacity.
    pub fn describe(&self) -> NamedList {
        let infos = self.infos.lock().clone().unwrap_or_default();
        infos
            .iter()
            .map(|info| (info.name().to_string(), info.describe()))
            .collect()
    }

    /// Stop serving. Idempotent; later calls fail with [`StoreError::Closed`].
    /// Cached filesystem handles stay alive until [`release_handles`].
    ///
    /// [`release_handles`]: CoreStore::release_handles
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let stores = self.infos.lock().take().map_or(0, |infos| infos.len());
        info!(stores, "[ch-03] Core store closed");
    }

    /// Drop every cached filesystem handle. Returns how many were released.
    pub fn release_handles(&self) -> usize {
        let released = {
            let mut handles = self.handles.write();
            let n = handles.len();
            handles.clear();
            n
        };
        debug!(released, "[ch-03] Store handles released");
        released
    }
}

impl Drop for CoreStore {
    fn drop(&mut self) {
        if !self.is_closed() {
            warn!("[ch-03] Core store dropped without close()");
        }
    }
}

impl std::fmt::Debug for CoreStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreStore")
            .field("local_dir", &self.config.local_dir)
            .field("uris", &self.config.uris)
            .field("closed", &self.is_closed())
            .finish()
    }
}
