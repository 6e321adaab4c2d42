//! Core descriptors
//!
//! A descriptor is the immutable identity of a core as declared under
//! `roles.<role>.cores`. It is created when the container loads its
//! source and dropped with the core.

use std::path::{Path, PathBuf};

use shared_types::{ConfigNode, CoreError, CoreResult, NamedList};

/// Config resource read from the instance directory when the core entry
/// carries no inline `plugins`.
pub const DEFAULT_CONFIG_NAME: &str = "core.toml";
pub const DEFAULT_FACTORY: &str = "default";
const DATA_DIR_NAME: &str = "data";

#[derive(Debug, Clone)]
pub struct CoreDescriptor {
    name: String,
    role: String,
    instance_dir: PathBuf,
    data_dir: PathBuf,
    config_name: String,
    factory: String,
    properties: NamedList,
    inline: Option<ConfigNode>,
}

/// Names are path segments in the HTTP surface and monitor scopes. A
/// leading `_` is reserved for host-level monitor scopes.
pub fn validate_core_name(name: &str) -> CoreResult<()> {
    let bad = name.is_empty()
        || name == "admin"
        || name.starts_with('.')
        || name.starts_with('_')
        || name.chars().any(|c| c == '/' || c == '\\' || c.is_whitespace());
    if bad {
        Err(CoreError::config("core.name", format!("invalid core name '{name}'")))
    } else {
        Ok(())
    }
}

impl CoreDescriptor {
    /// Descriptor with defaults: instance directory named after the core,
    /// data under `<instance_dir>/data`, config `core.toml`.
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        let name = name.into();
        let instance_dir = PathBuf::from(&name);
        Self {
            data_dir: instance_dir.join(DATA_DIR_NAME),
            instance_dir,
            role: role.into(),
            config_name: DEFAULT_CONFIG_NAME.to_string(),
            factory: DEFAULT_FACTORY.to_string(),
            properties: NamedList::new(),
            inline: None,
            name,
        }
    }

    /// Read one `roles.<role>.cores[]` entry.
    pub fn from_config(role: &str, node: &ConfigNode) -> CoreResult<Self> {
        let name = node.require_str("name")?.trim().to_string();
        validate_core_name(&name).map_err(|e| e.within(&node.context("name")))?;

        let mut descriptor = Self::new(name, role);
        if let Some(dir) = node.get_str("instance_dir") {
            descriptor = descriptor.with_instance_dir(dir);
        }
        if let Some(dir) = node.get_str("data_dir") {
            descriptor.data_dir = PathBuf::from(dir);
        }
        if let Some(config) = node.get_str("config") {
            descriptor.config_name = config.to_string();
        }
        if let Some(factory) = node.get_str("factory") {
            descriptor.factory = factory.to_string();
        }
        if let Some(props) = node.node("properties") {
            descriptor.properties = props.to_named_list();
        }
        if node.contains("plugins") {
            descriptor.inline = Some(node.clone());
        }
        Ok(descriptor)
    }

    /// Instance directory; the data directory follows unless it was set
    /// explicitly.
    #[must_use]
    pub fn with_instance_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if self.data_dir == self.instance_dir.join(DATA_DIR_NAME) {
            self.data_dir = dir.join(DATA_DIR_NAME);
        }
        self.instance_dir = dir;
        self
    }

    #[must_use]
    pub fn with_factory(mut self, factory: impl Into<String>) -> Self {
        self.factory = factory.into();
        self
    }

    #[must_use]
    pub fn with_properties(mut self, properties: NamedList) -> Self {
        self.properties = properties;
        self
    }

    /// Use `node` as the core configuration instead of a file.
    #[must_use]
    pub fn with_inline_config(mut self, node: ConfigNode) -> Self {
        self.inline = Some(node);
        self
    }

    /// Same declaration under another name.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn instance_dir(&self) -> &Path {
        &self.instance_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    /// `<instance_dir>/<config>`.
    pub fn config_path(&self) -> PathBuf {
        self.instance_dir.join(&self.config_name)
    }

    pub fn factory(&self) -> &str {
        &self.factory
    }

    pub fn properties(&self) -> &NamedList {
        &self.properties
    }

    pub fn inline_config(&self) -> Option<&ConfigNode> {
        self.inline.as_ref()
    }

    pub fn describe(&self) -> NamedList {
        NamedList::new()
            .with("name", self.name.as_str())
            .with("role", self.role.as_str())
            .with("instance_dir", self.instance_dir.display().to_string())
            .with("data_dir", self.data_dir.display().to_string())
            .with("config", self.config_name.as_str())
            .with("factory", self.factory.as_str())
            .with("properties", self.properties.clone())
    }
}
