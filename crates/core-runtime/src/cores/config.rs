//! Per-core configuration
//!
//! A core's configuration is either inlined in its `roles.<role>.cores[]`
//! entry or read from `<instance_dir>/<config>`. Only `plugins[]` is
//! interpreted here; the rest of the tree is handed to handlers as-is.

use ch_01_plugin_registry::PluginInfo;
use shared_types::{ConfigNode, ConfigSource, CoreResult, FileConfigSource};

use super::descriptor::CoreDescriptor;

#[derive(Debug, Clone)]
pub struct CoreConfig {
    node: ConfigNode,
    plugins: Vec<PluginInfo>,
}

impl CoreConfig {
    /// Parse the plugin declarations of `node`.
    pub fn from_node(node: ConfigNode) -> CoreResult<Self> {
        let plugins = node
            .nodes("plugins")
            .iter()
            .map(PluginInfo::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { node, plugins })
    }

    /// Load the configuration `descriptor` points at.
    pub fn load(descriptor: &CoreDescriptor) -> CoreResult<Self> {
        let node = match descriptor.inline_config() {
            Some(node) => Ok(node.clone()),
            None => FileConfigSource::new(descriptor.config_path()).load(),
        };
        node.and_then(Self::from_node)
            .map_err(|e| e.within(descriptor.name()))
    }

    pub fn resource(&self) -> &str {
        self.node.resource()
    }

    pub fn node(&self) -> &ConfigNode {
        &self.node
    }

    pub fn plugins(&self) -> &[PluginInfo] {
        &self.plugins
    }
}
