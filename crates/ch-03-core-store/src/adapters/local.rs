//! Local filesystem backend
//!
//! Files live under a root directory. Writes go to a sibling temp file and
//! are renamed into place so readers never see a partial document.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::domain::StoreScheme;
use crate::error::{StoreError, StoreResult};
use crate::ports::{Capacity, StoreFs};

/// Store filesystem rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalStoreFs {
    root: PathBuf,
}

impl LocalStoreFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a relative `/`-separated path under the root. Absolute paths and
    /// `.`/`..` segments are rejected.
    pub fn resolve(&self, path: &str) -> StoreResult<PathBuf> {
        if path.starts_with('/') || path.starts_with('\\') {
            return Err(StoreError::InvalidPath {
                path: path.to_string(),
                message: "absolute path not allowed".into(),
            });
        }
        let mut resolved = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(StoreError::InvalidPath {
                    path: path.to_string(),
                    message: "relative segments not allowed".into(),
                });
            }
            resolved.push(segment);
        }
        Ok(resolved)
    }

    fn io_err(path: &Path, e: std::io::Error) -> StoreError {
        StoreError::io(path.display().to_string(), e)
    }

    /// Nearest existing ancestor, so capacity can be probed before the root
    /// itself has been created.
    fn existing_ancestor(&self) -> PathBuf {
        let mut probe = self.root.as_path();
        loop {
            if probe.exists() {
                return probe.to_path_buf();
            }
            match probe.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => probe = parent,
                _ => return PathBuf::from("."),
            }
        }
    }
}

#[async_trait]
impl StoreFs for LocalStoreFs {
    fn scheme(&self) -> StoreScheme {
        StoreScheme::Local
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }

    async fn read(&self, path: &str) -> StoreResult<Option<Vec<u8>>> {
        let full = self.resolve(path)?;
        match fs::read(&full).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_err(&full, e)),
        }
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> StoreResult<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_err(parent, e))?;
        }

        let mut tmp_name = full.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp = full.with_file_name(tmp_name);

        fs::write(&tmp, bytes)
            .await
            .map_err(|e| Self::io_err(&tmp, e))?;
        fs::rename(&tmp, &full)
            .await
            .map_err(|e| Self::io_err(&full, e))
    }

    async fn mkdirs(&self, path: &str) -> StoreResult<()> {
        let full = self.resolve(path)?;
        fs::create_dir_all(&full)
            .await
            .map_err(|e| Self::io_err(&full, e))
    }

    async fn exists(&self, path: &str) -> StoreResult<bool> {
        let full = self.resolve(path)?;
        fs::try_exists(&full)
            .await
            .map_err(|e| Self::io_err(&full, e))
    }

    async fn delete(&self, path: &str) -> StoreResult<bool> {
        let full = self.resolve(path)?;
        let meta = match fs::metadata(&full).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(Self::io_err(&full, e)),
        };
        let result = if meta.is_dir() {
            fs::remove_dir_all(&full).await
        } else {
            fs::remove_file(&full).await
        };
        result.map(|()| true).map_err(|e| Self::io_err(&full, e))
    }

    async fn list(&self, path: &str) -> StoreResult<Vec<String>> {
        let full = self.resolve(path)?;
        let mut dir = match fs::read_dir(&full).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::io_err(&full, e)),
        };
        let mut names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| Self::io_err(&full, e))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn capacity(&self) -> StoreResult<Capacity> {
        let probe = self.existing_ancestor();
        let total = fs2::total_space(&probe).map_err(|e| Self::io_err(&probe, e))?;
        let usable = fs2::available_space(&probe).map_err(|e| Self::io_err(&probe, e))?;
        let free = fs2::free_space(&probe).map_err(|e| Self::io_err(&probe, e))?;
        Ok(Capacity {
            total,
            usable,
            free,
        })
    }
}
