//! Admin-level configuration (`[admin]` section and the role table)

use std::path::PathBuf;
use std::time::Duration;

use shared_types::{ConfigNode, CoreError, CoreResult};

pub const DEFAULT_CORE_NAME: &str = "main";
pub const DEFAULT_ROLE: &str = "default";
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Core served when a lookup names no core.
    pub default_core_name: String,
    /// Shared resource directory reported to handlers.
    pub lib_path: Option<PathBuf>,
    /// Bound on each await during shutdown.
    pub shutdown_timeout: Duration,
    /// Role names under `[roles]`, sorted.
    pub roles: Vec<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            default_core_name: DEFAULT_CORE_NAME.to_string(),
            lib_path: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            roles: Vec::new(),
        }
    }
}

impl AdminConfig {
    pub fn from_config(root: &ConfigNode) -> CoreResult<Self> {
        let defaults = Self::default();
        let mut roles = root.node("roles").map(|n| n.keys()).unwrap_or_default();
        roles.sort();
        for role in &roles {
            if role.is_empty() || role.contains('.') {
                return Err(CoreError::config(
                    root.context("roles"),
                    format!("invalid role name '{role}'"),
                ));
            }
        }
        Ok(Self {
            default_core_name: root
                .get_str("admin.default_core_name")
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or(defaults.default_core_name),
            lib_path: root.get_str("admin.lib_path").map(PathBuf::from),
            shutdown_timeout: root
                .get_i64("admin.shutdown_timeout_secs")
                .and_then(|s| u64::try_from(s).ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            roles,
        })
    }

    /// Roles to build containers for. A configuration without roles still
    /// gets one empty container so the admin surface is available.
    pub fn effective_roles(&self) -> Vec<String> {
        if self.roles.is_empty() {
            vec![DEFAULT_ROLE.to_string()]
        } else {
            self.roles.clone()
        }
    }
}

/// Config path of the core list for `role`.
pub fn role_cores_path(role: &str) -> String {
    format!("roles.{role}.cores")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let root = ConfigNode::parse(
            "host.toml",
            r#"
            [admin]
            default_core_name = "logs"
            lib_path = "/srv/lib"
            shutdown_timeout_secs = 3

            [[roles.search.cores]]
            name = "logs"

            [[roles.analytics.cores]]
            name = "events"
            "#,
        )
        .unwrap();
        let config = AdminConfig::from_config(&root).unwrap();
        assert_eq!(config.default_core_name, "logs");
        assert_eq!(config.lib_path, Some(PathBuf::from("/srv/lib")));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(3));
        assert_eq!(config.roles, vec!["analytics", "search"]);
        assert_eq!(root.nodes(&role_cores_path("search")).len(), 1);
    }

    #[test]
    fn test_defaults() {
        let config = AdminConfig::from_config(&ConfigNode::empty("host.toml")).unwrap();
        assert_eq!(config.default_core_name, DEFAULT_CORE_NAME);
        assert!(config.roles.is_empty());
        assert_eq!(config.effective_roles(), vec![DEFAULT_ROLE]);
    }
}
