//! Cluster configuration (`[cluster]` and `[host]` sections)

use std::time::Duration;

use shared_types::{ConfigNode, CoreResult};

use super::host::{HostIdentity, HostMode, HostNode, HostSelf};

pub const DEFAULT_CLUSTER_ID: &str = "default";
pub const DEFAULT_HTTP_PORT: u16 = 8983;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub cluster_id: String,
    pub identity: HostIdentity,
    /// Shared secret sent as `X-Cluster-Secret` and required on incoming
    /// handshakes when set.
    pub secret: Option<String>,
    pub join_address: Option<String>,
    pub attach_address: Option<String>,
    pub attach_allow: Vec<String>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            cluster_id: DEFAULT_CLUSTER_ID.to_string(),
            identity: HostIdentity {
                name: "localhost".to_string(),
                http_port: DEFAULT_HTTP_PORT,
                ..HostIdentity::default()
            },
            secret: None,
            join_address: None,
            attach_address: None,
            attach_allow: Vec::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl ClusterConfig {
    pub fn from_config(root: &ConfigNode) -> CoreResult<Self> {
        let defaults = Self::default();
        let identity = HostIdentity {
            name: non_empty(root.get_str("host.name")).unwrap_or(defaults.identity.name),
            domain: non_empty(root.get_str("cluster.domain")).unwrap_or_default(),
            lan_address: non_empty(root.get_str("host.lan_address")).unwrap_or_default(),
            public_address: non_empty(root.get_str("host.public_address")).unwrap_or_default(),
            http_port: root
                .get_port("host.http_port")?
                .unwrap_or(defaults.identity.http_port),
            https_port: root.get_port("host.https_port")?.unwrap_or(0),
        };
        let secs = |path: &str, fallback: Duration| {
            root.get_i64(path)
                .and_then(|s| u64::try_from(s).ok())
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };
        Ok(Self {
            cluster_id: non_empty(root.get_str("cluster.id")).unwrap_or(defaults.cluster_id),
            identity,
            secret: non_empty(root.get_str("cluster.secret")),
            join_address: non_empty(root.get_str("cluster.join_address")),
            attach_address: non_empty(root.get_str("cluster.attach_address")),
            attach_allow: root.get_str_list("cluster.attach_allow"),
            request_timeout: secs("cluster.request_timeout_secs", defaults.request_timeout),
            connect_timeout: secs("cluster.connect_timeout_secs", defaults.connect_timeout),
        })
    }

    /// Local host record. Mode follows the configured entry path.
    pub fn host_self(&self) -> HostSelf {
        let mode = if self.attach_address.is_some() {
            HostMode::Attach
        } else if self.join_address.is_some() {
            HostMode::Join
        } else {
            HostMode::Host
        };
        HostSelf {
            node: HostNode::new(self.identity.clone(), self.cluster_id.clone(), mode),
            join_address: self.join_address.clone(),
            attach_address: self.attach_address.clone(),
            attach_allow: self.attach_allow.clone(),
        }
    }
}

/// Split `host[:port]` (optionally `http://`-prefixed) into its parts.
/// A missing port falls back to `default_port`.
pub fn parse_address(address: &str, default_port: u16) -> Option<(String, u16)> {
    let rest = address
        .trim()
        .trim_start_matches("http://")
        .trim_start_matches("https://");
    let authority = rest.split('/').next().unwrap_or_default();
    if authority.is_empty() {
        return None;
    }
    // Bracketed IPv6 literal.
    if let Some(stripped) = authority.strip_prefix('[') {
        let (host, tail) = stripped.split_once(']')?;
        let port = match tail.strip_prefix(':') {
            Some(p) => p.parse().ok()?,
            None => default_port,
        };
        return Some((host.to_string(), port));
    }
    match authority.rsplit_once(':') {
        Some((host, port)) => Some((host.to_string(), port.parse().ok()?)),
        None => Some((authority.to_string(), default_port)),
    }
}

/// `http://host:port` for a configured address.
pub fn address_url(address: &str, default_port: u16) -> Option<String> {
    let (host, port) = parse_address(address, default_port)?;
    if host.contains(':') {
        Some(format!("http://[{host}]:{port}"))
    } else {
        Some(format!("http://{host}:{port}"))
    }
}
