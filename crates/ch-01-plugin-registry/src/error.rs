//! Error types for the plugin registry

use shared_types::CoreError;
use thiserror::Error;

/// Errors raised while resolving or instantiating plugins.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PluginError {
    /// The declared implementation key has no registered factory.
    #[error("Unknown plugin key '{key}' for '{name}'")]
    UnknownKey { name: String, key: String },

    /// The factory ran and reported a failure.
    #[error("Failed to instantiate '{name}': {message}")]
    Instantiation { name: String, message: String },

    /// The declaration itself is malformed.
    #[error("Invalid plugin declaration [{context}]: {message}")]
    InvalidDeclaration { context: String, message: String },
}

impl PluginError {
    pub fn instantiation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Instantiation {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Every plugin failure is a configuration error to the rest of the host.
impl From<PluginError> for CoreError {
    fn from(err: PluginError) -> Self {
        match &err {
            PluginError::UnknownKey { name, .. } | PluginError::Instantiation { name, .. } => {
                CoreError::config(format!("plugins/{name}"), err.to_string())
            }
            PluginError::InvalidDeclaration { context, message } => {
                CoreError::config(context.clone(), message.clone())
            }
        }
    }
}
