//! Store descriptors with cached capacity
//!
//! Capacity probes hit the disk or the namenode, so each [`StoreInfo`]
//! caches the last result for a fixed window (60 seconds by default). The
//! cache is guarded by a per-store async mutex held across the probe, which
//! makes concurrent callers inside one window share a single refresh.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use shared_types::NamedList;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::StoreScheme;
use crate::error::StoreResult;
use crate::ports::{Capacity, StoreFs};

/// Default capacity cache window.
pub const CAPACITY_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct CachedCapacity {
    at: Instant,
    capacity: Capacity,
}

/// One backing store.
pub struct StoreInfo {
    name: String,
    fs: Arc<dyn StoreFs>,
    ttl: Duration,
    cache: Mutex<Option<CachedCapacity>>,
    refreshes: AtomicU64,
}

impl StoreInfo {
    pub fn new(name: impl Into<String>, fs: Arc<dyn StoreFs>) -> Self {
        Self::with_ttl(name, fs, CAPACITY_TTL)
    }

    pub fn with_ttl(name: impl Into<String>, fs: Arc<dyn StoreFs>, ttl: Duration) -> Self {
        Self {
            name: name.into(),
            fs,
            ttl,
            cache: Mutex::new(None),
            refreshes: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scheme(&self) -> StoreScheme {
        self.fs.scheme()
    }

    pub fn location(&self) -> String {
        self.fs.location()
    }

    pub fn fs(&self) -> &Arc<dyn StoreFs> {
        &self.fs
    }

    /// Number of capacity probes made so far.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Acquire)
    }

    /// Capacity, refreshed at most once per window.
    pub async fn capacity(&self) -> StoreResult<Capacity> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = *cache {
            if cached.at.elapsed() < self.ttl {
                return Ok(cached.capacity);
            }
        }

        self.refreshes.fetch_add(1, Ordering::AcqRel);
        match self.fs.capacity().await {
            Ok(capacity) => {
                debug!(
                    store = %self.name,
                    total = capacity.total,
                    usable = capacity.usable,
                    "[ch-03] Capacity refreshed"
                );
                *cache = Some(CachedCapacity {
                    at: Instant::now(),
                    capacity,
                });
                Ok(capacity)
            }
            Err(e) => {
                warn!(store = %self.name, error = %e, "[ch-03] Capacity probe failed");
                Err(e)
            }
        }
    }

    pub async fn total_space(&self) -> StoreResult<u64> {
        Ok(self.capacity().await?.total)
    }

    pub async fn usable_space(&self) -> StoreResult<u64> {
        Ok(self.capacity().await?.usable)
    }

    pub async fn free_space(&self) -> StoreResult<u64> {
        Ok(self.capacity().await?.free)
    }

    /// Descriptor plus the last cached capacity, without probing.
    pub fn describe(&self) -> NamedList {
        let mut out = NamedList::new()
            .with("name", self.name.as_str())
            .with("scheme", self.scheme().to_string())
            .with("location", self.location());
        if let Ok(cache) = self.cache.try_lock() {
            if let Some(cached) = *cache {
                out.add("total", cached.capacity.total);
                out.add("usable", cached.capacity.usable);
                out.add("free", cached.capacity.free);
            }
        }
        out
    }
}

impl std::fmt::Debug for StoreInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreInfo")
            .field("name", &self.name)
            .field("scheme", &self.scheme())
            .field("location", &self.location())
            .finish()
    }
}
