//! Error types for the runtime's administrative surface

use ch_04_core_cluster::ClusterError;
use shared_types::{CoreError, ErrorKind};
use thiserror::Error;

/// Errors returned by [`crate::admin::CoreAdmin`].
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("Unknown admin action '{0}'")]
    UnknownAction(String),

    #[error("Missing required parameter '{0}'")]
    MissingParam(&'static str),

    /// The owning containers are gone or shutting down.
    #[error("Admin handler is unavailable")]
    Unavailable,
}

impl AdminError {
    /// HTTP status for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Core(err) => match err.kind() {
                ErrorKind::Config => 400,
                ErrorKind::NotFound => 404,
                ErrorKind::Contract => 409,
                ErrorKind::Io => 500,
                ErrorKind::Remote => 502,
            },
            Self::Cluster(err) => match err {
                ClusterError::Forbidden(_) => 403,
                ClusterError::ForeignCluster { .. } => 409,
                ClusterError::Config { .. } => 400,
                ClusterError::Closed | ClusterError::Cancelled => 503,
                _ => 502,
            },
            Self::UnknownAction(_) | Self::MissingParam(_) => 400,
            Self::Unavailable => 503,
        }
    }
}

pub type AdminResult<T> = Result<T, AdminError>;
