//! Admin actions and requests

use std::fmt;
use std::str::FromStr;

use shared_types::NamedList;

use crate::error::AdminError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminAction {
    /// Cores, descriptors, open counts and init failures.
    Status,
    Reload,
    Unload,
    Swap,
    Rename,
    Create,
    /// Monitor registry snapshot.
    Monitors,
    /// Host registry snapshot.
    Cluster,
    Ping,
    Join,
    Attach,
    Hosts,
}

impl AdminAction {
    pub const ALL: [AdminAction; 12] = [
        Self::Status,
        Self::Reload,
        Self::Unload,
        Self::Swap,
        Self::Rename,
        Self::Create,
        Self::Monitors,
        Self::Cluster,
        Self::Ping,
        Self::Join,
        Self::Attach,
        Self::Hosts,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Status => "STATUS",
            Self::Reload => "RELOAD",
            Self::Unload => "UNLOAD",
            Self::Swap => "SWAP",
            Self::Rename => "RENAME",
            Self::Create => "CREATE",
            Self::Monitors => "MONITORS",
            Self::Cluster => "CLUSTER",
            Self::Ping => "PING",
            Self::Join => "JOIN",
            Self::Attach => "ATTACH",
            Self::Hosts => "HOSTS",
        }
    }

    /// Cluster handshakes. These authenticate with the cluster secret
    /// instead of running as local administration.
    pub fn is_handshake(self) -> bool {
        matches!(self, Self::Ping | Self::Join | Self::Attach | Self::Hosts)
    }
}

impl FromStr for AdminAction {
    type Err = AdminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == upper)
            .ok_or_else(|| AdminError::UnknownAction(s.to_string()))
    }
}

impl fmt::Display for AdminAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One administrative request, independent of the transport.
#[derive(Debug, Clone)]
pub struct AdminRequest {
    pub action: AdminAction,
    pub params: NamedList,
    pub body: Option<serde_json::Value>,
    /// Presented `X-Cluster-Secret`.
    pub secret: Option<String>,
    /// Presented `X-Cluster-Id`.
    pub cluster_id: Option<String>,
}

impl AdminRequest {
    pub fn new(action: AdminAction) -> Self {
        Self {
            action,
            params: NamedList::new(),
            body: None,
            secret: None,
            cluster_id: None,
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.add(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get_str(name).filter(|s| !s.is_empty())
    }

    pub fn require(&self, name: &'static str) -> Result<&str, AdminError> {
        self.param(name).ok_or(AdminError::MissingParam(name))
    }
}
