//! Error types for cluster membership

use shared_types::CoreError;
use thiserror::Error;

/// Errors raised by membership operations and fetches.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClusterError {
    /// The cluster subsystem has been closed.
    #[error("Cluster subsystem is closed")]
    Closed,

    /// The operation was cancelled by shutdown before it completed.
    #[error("Cancelled by shutdown")]
    Cancelled,

    /// Transport failure (connect, timeout, body read).
    #[error("HTTP request to {url} failed: {message}")]
    Http { url: String, message: String },

    /// Non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Response body could not be decoded.
    #[error("Bad response from {url}: {message}")]
    Decode { url: String, message: String },

    /// Shared secret missing or wrong, or caller not allow-listed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Handshake from a host in a different cluster.
    #[error("Foreign cluster '{actual}' (expected '{expected}')")]
    ForeignCluster { expected: String, actual: String },

    /// Configuration value is invalid.
    #[error("Invalid cluster configuration [{context}]: {message}")]
    Config { context: String, message: String },
}

impl From<ClusterError> for CoreError {
    fn from(err: ClusterError) -> Self {
        match err {
            ClusterError::Closed | ClusterError::Cancelled => {
                CoreError::contract("cluster", err.to_string())
            }
            ClusterError::Config { context, message } => CoreError::config(context, message),
            ClusterError::Http { ref url, .. }
            | ClusterError::Status { ref url, .. }
            | ClusterError::Decode { ref url, .. } => CoreError::remote(url.clone(), err.to_string()),
            ClusterError::Forbidden(_) | ClusterError::ForeignCluster { .. } => {
                CoreError::remote("cluster", err.to_string())
            }
        }
    }
}

pub type ClusterResult<T> = Result<T, ClusterError>;
