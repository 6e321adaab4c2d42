//! Error types for the store subsystem

use shared_types::CoreError;
use thiserror::Error;

/// Errors raised by store filesystems and the store service.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The URI has a scheme no backend handles, or is malformed.
    #[error("Invalid store URI '{uri}': {message}")]
    InvalidUri { uri: String, message: String },

    /// Local filesystem failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Distributed filesystem request failed.
    #[error("Remote store error at {url}: {message}")]
    Remote { url: String, message: String },

    /// Stored document could not be decoded or encoded.
    #[error("Document error at {path}: {message}")]
    Document { path: String, message: String },

    /// Path argument escapes the store root or names an invalid entity.
    #[error("Invalid path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    /// The store has been closed.
    #[error("Store is closed")]
    Closed,
}

impl StoreError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn remote(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            url: url.into(),
            message: message.into(),
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidUri { uri, message } => CoreError::config(uri, message),
            StoreError::InvalidPath { path, message } => CoreError::config(path, message),
            StoreError::Io { path, source } => CoreError::io(path, source),
            StoreError::Remote { url, message } => CoreError::remote(url, message),
            StoreError::Document { path, message } => CoreError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, message),
            ),
            StoreError::Closed => CoreError::contract("store", "used after close"),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
