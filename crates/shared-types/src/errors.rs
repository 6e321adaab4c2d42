//! # Error Types
//!
//! Defines the error taxonomy used across subsystems.
//!
//! | Variant | Meaning | Propagation |
//! |---------|---------|-------------|
//! | `Config` | Missing/invalid setting, unknown plugin key, bad store scheme | Fatal to the triggering operation |
//! | `Io` | Filesystem failure | Surfaced to the caller or listener |
//! | `Remote` | Network fetch or handshake failure | Surfaced to the listener |
//! | `Contract` | Double init, use before init, use after close | Fatal to the triggering call |
//! | `NotFound` | Named entity absent | Caller decides |

use std::fmt;

use thiserror::Error;

/// Errors that can occur anywhere in the host.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration error with enough context to locate the declaration.
    #[error("Configuration error [{context}]: {message}")]
    Config { context: String, message: String },

    /// Local I/O failure.
    #[error("I/O error [{context}]: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Remote (network) failure.
    #[error("Remote error [{context}]: {message}")]
    Remote { context: String, message: String },

    /// Lifecycle contract violated by the caller.
    #[error("Contract violation [{context}]: {message}")]
    Contract { context: String, message: String },

    /// Named entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Coarse classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Io,
    Remote,
    Contract,
    NotFound,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => write!(f, "config"),
            Self::Io => write!(f, "io"),
            Self::Remote => write!(f, "remote"),
            Self::Contract => write!(f, "contract"),
            Self::NotFound => write!(f, "not_found"),
        }
    }
}

impl CoreError {
    pub fn config(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn remote(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn contract(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Contract {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Get the classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Config,
            Self::Io { .. } => ErrorKind::Io,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::Contract { .. } => ErrorKind::Contract,
            Self::NotFound(_) => ErrorKind::NotFound,
        }
    }

    /// True for configuration errors.
    #[must_use]
    pub fn is_config(&self) -> bool {
        self.kind() == ErrorKind::Config
    }

    /// True for lifecycle contract violations.
    #[must_use]
    pub fn is_contract(&self) -> bool {
        self.kind() == ErrorKind::Contract
    }

    /// True when retrying later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Io | ErrorKind::Remote)
    }

    /// Prefix the context with an outer scope, e.g. the owning core name.
    #[must_use]
    pub fn within(self, scope: &str) -> Self {
        match self {
            Self::Config { context, message } => Self::Config {
                context: format!("{scope}/{context}"),
                message,
            },
            Self::Io { context, source } => Self::Io {
                context: format!("{scope}/{context}"),
                source,
            },
            Self::Remote { context, message } => Self::Remote {
                context: format!("{scope}/{context}"),
                message,
            },
            Self::Contract { context, message } => Self::Contract {
                context: format!("{scope}/{context}"),
                message,
            },
            Self::NotFound(what) => Self::NotFound(format!("{scope}/{what}")),
        }
    }
}

/// Result alias used across the workspace.
pub type CoreResult<T> = Result<T, CoreError>;
