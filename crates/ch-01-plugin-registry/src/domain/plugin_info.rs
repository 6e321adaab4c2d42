//! Plugin declarations

use std::fmt;
use std::str::FromStr;

use shared_types::{ConfigNode, NamedList};

use crate::error::PluginError;

/// When a declared plugin is instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartupMode {
    /// At registry load. Failure aborts the load.
    #[default]
    Eager,
    /// On first use. Failure is reported to that caller only.
    Lazy,
}

impl FromStr for StartupMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "eager" => Ok(Self::Eager),
            "lazy" => Ok(Self::Lazy),
            other => Err(format!("unknown startup mode '{other}'")),
        }
    }
}

impl fmt::Display for StartupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eager => write!(f, "eager"),
            Self::Lazy => write!(f, "lazy"),
        }
    }
}

/// One declared plugin: name, implementation key, flags and init args.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginInfo {
    pub name: String,
    /// Implementation key looked up in the factory registry.
    pub class: String,
    pub default: bool,
    pub startup: StartupMode,
    pub args: NamedList,
}

impl PluginInfo {
    pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
            default: false,
            startup: StartupMode::Eager,
            args: NamedList::new(),
        }
    }

    #[must_use]
    pub fn lazy(mut self) -> Self {
        self.startup = StartupMode::Lazy;
        self
    }

    #[must_use]
    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }

    #[must_use]
    pub fn with_args(mut self, args: NamedList) -> Self {
        self.args = args;
        self
    }

    pub fn is_lazy(&self) -> bool {
        self.startup == StartupMode::Lazy
    }

    /// Read a declaration from a `plugins[]` table.
    ///
    /// ```toml
    /// [[plugins]]
    /// name = "/ping"
    /// class = "ping"
    /// default = false
    /// startup = "lazy"
    /// [plugins.args]
    /// greeting = "pong"
    /// ```
    pub fn from_config(node: &ConfigNode) -> Result<Self, PluginError> {
        let invalid = |path: &str, message: String| PluginError::InvalidDeclaration {
            context: node.context(path),
            message,
        };

        let name = node
            .get_str("name")
            .ok_or_else(|| invalid("name", "missing plugin name".into()))?;
        let class = node
            .get_str("class")
            .ok_or_else(|| invalid("class", format!("missing implementation key for '{name}'")))?;
        let startup = node
            .get_str("startup")
            .unwrap_or_default()
            .parse::<StartupMode>()
            .map_err(|e| invalid("startup", e))?;
        let args = node
            .node("args")
            .map(|n| n.to_named_list())
            .unwrap_or_default();

        Ok(Self {
            name: name.to_string(),
            class: class.to_string(),
            default: node.get_bool("default").unwrap_or(false),
            startup,
            args,
        })
    }
}
