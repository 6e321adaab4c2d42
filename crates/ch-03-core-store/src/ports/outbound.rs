//! # Outbound Ports (Driven Ports)
//!
//! Filesystem operations the store service needs from a backend.
//!
//! Production: `LocalStoreFs` (tokio::fs + fs2), `WebHdfsStoreFs` (reqwest)
//!
//! All paths are relative to the backend's root and use `/` separators.

use async_trait::async_trait;

use crate::domain::StoreScheme;
use crate::error::StoreResult;

/// Capacity figures for one backing store, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capacity {
    pub total: u64,
    /// Space available to this process (may exclude reserved blocks).
    pub usable: u64,
    pub free: u64,
}

/// Abstract filesystem rooted at one location.
#[async_trait]
pub trait StoreFs: Send + Sync {
    fn scheme(&self) -> StoreScheme;

    /// Root location, as a display string.
    fn location(&self) -> String;

    /// Read a file. `Ok(None)` when it does not exist.
    async fn read(&self, path: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Create or replace a file, creating parent directories.
    async fn write(&self, path: &str, bytes: &[u8]) -> StoreResult<()>;

    /// Create a directory and its parents. Idempotent.
    async fn mkdirs(&self, path: &str) -> StoreResult<()>;

    async fn exists(&self, path: &str) -> StoreResult<bool>;

    /// Delete a file or directory tree. `Ok(false)` when nothing existed.
    async fn delete(&self, path: &str) -> StoreResult<bool>;

    /// Names of the direct children of a directory, sorted.
    async fn list(&self, path: &str) -> StoreResult<Vec<String>>;

    /// Current capacity of the backing store.
    async fn capacity(&self) -> StoreResult<Capacity>;
}
