//! # Configuration Source
//!
//! The declarative configuration is an opaque tree addressed by dotted
//! paths (`cluster.join_address`, `roles.main.cores`). Consumers never see
//! the file grammar; they ask a [`ConfigNode`] for typed values and get a
//! [`CoreError::Config`] naming the resource and path when a required value
//! is missing.
//!
//! ## Config File Format
//!
//! ```toml
//! [admin]
//! default_core_name = "main"
//!
//! [[roles.main.cores]]
//! name = "main"
//! instance_dir = "/srv/cores/main"
//! factory = "default"
//!
//! [[roles.main.cores.plugins]]
//! name = "/ping"
//! class = "ping"
//! startup = "lazy"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::{CoreError, CoreResult};
use crate::named_list::{NamedList, Value};

/// A subtree of the configuration.
#[derive(Debug, Clone)]
pub struct ConfigNode {
    resource: Arc<str>,
    path: String,
    table: toml::Table,
}

impl ConfigNode {
    /// Parse TOML text. `resource` is used only for error context.
    pub fn parse(resource: &str, text: &str) -> CoreResult<Self> {
        let table = text
            .parse::<toml::Table>()
            .map_err(|e| CoreError::config(resource, format!("parse failed: {e}")))?;
        Ok(Self {
            resource: Arc::from(resource),
            path: String::new(),
            table,
        })
    }

    /// An empty tree.
    pub fn empty(resource: &str) -> Self {
        Self {
            resource: Arc::from(resource),
            path: String::new(),
            table: toml::Table::new(),
        }
    }

    /// Name of the resource this node was loaded from.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Dotted path of this node from the root (empty for the root).
    pub fn path(&self) -> &str {
        &self.path
    }

    fn lookup(&self, path: &str) -> Option<&toml::Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.table.get(first)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }

    fn full_path(&self, path: &str) -> String {
        if self.path.is_empty() {
            path.to_string()
        } else {
            format!("{}.{}", self.path, path)
        }
    }

    /// Error context in the form `resource:path`.
    pub fn context(&self, path: &str) -> String {
        format!("{}:{}", self.resource, self.full_path(path))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.lookup(path).and_then(toml::Value::as_str)
    }

    pub fn get_i64(&self, path: &str) -> Option<i64> {
        self.lookup(path).and_then(toml::Value::as_integer)
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.lookup(path).and_then(toml::Value::as_bool)
    }

    /// Port-sized integer. Values outside `u16` are a configuration error.
    pub fn get_port(&self, path: &str) -> CoreResult<Option<u16>> {
        match self.get_i64(path) {
            None => Ok(None),
            Some(raw) => u16::try_from(raw)
                .map(Some)
                .map_err(|_| CoreError::config(self.context(path), format!("invalid port {raw}"))),
        }
    }

    /// A string list. A single string is accepted as a one-element list.
    pub fn get_str_list(&self, path: &str) -> Vec<String> {
        match self.lookup(path) {
            Some(toml::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(toml::Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    /// A required string value.
    pub fn require_str(&self, path: &str) -> CoreResult<&str> {
        self.get_str(path)
            .ok_or_else(|| CoreError::config(self.context(path), "missing required value"))
    }

    /// A nested table.
    pub fn node(&self, path: &str) -> Option<ConfigNode> {
        let table = self.lookup(path)?.as_table()?.clone();
        Some(ConfigNode {
            resource: Arc::clone(&self.resource),
            path: self.full_path(path),
            table,
        })
    }

    /// An array of tables (`[[path]]`). Non-table elements are skipped.
    pub fn nodes(&self, path: &str) -> Vec<ConfigNode> {
        let Some(toml::Value::Array(items)) = self.lookup(path) else {
            return Vec::new();
        };
        items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| {
                item.as_table().map(|table| ConfigNode {
                    resource: Arc::clone(&self.resource),
                    path: format!("{}[{idx}]", self.full_path(path)),
                    table: table.clone(),
                })
            })
            .collect()
    }

    /// Top-level keys of this node.
    pub fn keys(&self) -> Vec<String> {
        self.table.keys().cloned().collect()
    }

    /// Convert this subtree into a [`NamedList`].
    pub fn to_named_list(&self) -> NamedList {
        table_to_named_list(&self.table)
    }
}

fn table_to_named_list(table: &toml::Table) -> NamedList {
    table
        .iter()
        .map(|(name, value)| (name.clone(), toml_to_value(value)))
        .collect()
}

fn toml_to_value(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::Str(s.clone()),
        toml::Value::Integer(i) => Value::Int(*i),
        toml::Value::Float(f) => Value::Float(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::Str(dt.to_string()),
        toml::Value::Array(items) => Value::List(items.iter().map(toml_to_value).collect()),
        toml::Value::Table(t) => Value::Map(table_to_named_list(t)),
    }
}

/// Where a configuration tree comes from.
pub trait ConfigSource: Send + Sync {
    /// Human-readable resource name for error context.
    fn resource_name(&self) -> &str;

    /// Load and parse the tree.
    fn load(&self) -> CoreResult<ConfigNode>;
}

/// TOML file on local disk.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
    name: String,
}

impl FileConfigSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path.display().to_string();
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileConfigSource {
    fn resource_name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> CoreResult<ConfigNode> {
        let text =
            std::fs::read_to_string(&self.path).map_err(|e| CoreError::io(self.name.clone(), e))?;
        ConfigNode::parse(&self.name, &text)
    }
}

/// TOML text held in memory. Used by tests and embedded defaults.
#[derive(Debug, Clone)]
pub struct InlineConfigSource {
    name: String,
    text: String,
}

impl InlineConfigSource {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

impl ConfigSource for InlineConfigSource {
    fn resource_name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> CoreResult<ConfigNode> {
        ConfigNode::parse(&self.name, &self.text)
    }
}
