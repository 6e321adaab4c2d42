//! Host identity
//!
//! A host key is the hex SHA-256 digest over the identity fields:
//!
//! ```text
//! key  = hex(SHA-256(name, domain, lan_address, public_address, http_port, https_port))
//! hash = i64::from_be_bytes(digest[0..8])
//! ```
//!
//! Each field is length-prefixed before hashing so adjacent fields cannot
//! run together. Unchanged inputs give the same key across restarts.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Inputs to host key derivation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HostIdentity {
    pub name: String,
    pub domain: String,
    pub lan_address: String,
    pub public_address: String,
    pub http_port: u16,
    pub https_port: u16,
}

impl HostIdentity {
    fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for field in [
            self.name.as_bytes(),
            self.domain.as_bytes(),
            self.lan_address.as_bytes(),
            self.public_address.as_bytes(),
        ] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field);
        }
        hasher.update(self.http_port.to_be_bytes());
        hasher.update(self.https_port.to_be_bytes());
        hasher.finalize().into()
    }

    /// Preferred address for reaching this host: public, then LAN, then name.
    pub fn address(&self) -> &str {
        [&self.public_address, &self.lan_address, &self.name]
            .into_iter()
            .find(|a| !a.is_empty())
            .map_or("", String::as_str)
    }

    /// `http://<address>:<http_port>`.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.address(), self.http_port)
    }

    /// `name.domain`, when a domain is configured.
    pub fn fqdn(&self) -> Option<String> {
        if self.name.is_empty() || self.domain.is_empty() {
            return None;
        }
        Some(format!("{}.{}", self.name, self.domain.trim_start_matches('.')))
    }

    fn port_matches(&self, port: u16) -> bool {
        port == self.http_port || (self.https_port != 0 && port == self.https_port)
    }

    /// Whether `host:port` literally names this identity (name, FQDN, LAN
    /// or public address). No lookups.
    pub fn answers_to(&self, host: &str, port: u16) -> bool {
        let host = strip_brackets(host);
        let fqdn = self.fqdn().unwrap_or_default();
        let host_matches = [&self.name, &fqdn, &self.lan_address, &self.public_address]
            .into_iter()
            .any(|a| !a.is_empty() && a.eq_ignore_ascii_case(host));
        host_matches && self.port_matches(port)
    }

    /// Whether `host:port` reaches this identity once names are resolved.
    ///
    /// On a matching port, a target resolving to a loopback or unspecified
    /// address is this host, as is any target sharing an address with the
    /// resolved LAN, public, name or FQDN entries. Lookups that fail or time
    /// out contribute no addresses.
    pub async fn resolves_to_self(&self, host: &str, port: u16) -> bool {
        if !self.port_matches(port) {
            return false;
        }
        if self.answers_to(host, port) {
            return true;
        }
        let targets = resolve(host, port).await;
        if targets.iter().any(|ip| ip.is_loopback() || ip.is_unspecified()) {
            return true;
        }
        if targets.is_empty() {
            return false;
        }
        let fqdn = self.fqdn().unwrap_or_default();
        for own in [&self.lan_address, &self.public_address, &self.name, &fqdn] {
            if own.is_empty() {
                continue;
            }
            if resolve(own, port).await.iter().any(|ip| targets.contains(ip)) {
                return true;
            }
        }
        false
    }
}

/// Upper bound on each name lookup made by [`HostIdentity::resolves_to_self`].
pub const RESOLVE_TIMEOUT: Duration = Duration::from_secs(1);

fn strip_brackets(host: &str) -> &str {
    host.trim_matches(|c| c == '[' || c == ']')
}

async fn resolve(host: &str, port: u16) -> Vec<IpAddr> {
    let host = strip_brackets(host);
    if let Ok(ip) = host.parse::<IpAddr>() {
        return vec![ip];
    }
    match tokio::time::timeout(RESOLVE_TIMEOUT, tokio::net::lookup_host((host, port))).await {
        Ok(Ok(addrs)) => addrs.map(|a| a.ip()).collect(),
        _ => Vec::new(),
    }
}

/// Deterministic host identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostKey(String);

impl HostKey {
    pub fn derive(identity: &HostIdentity) -> Self {
        Self(hex::encode(identity.digest()))
    }

    /// Wrap an existing key string (for lookups from requests).
    pub fn from_string(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Numeric hash: first eight digest bytes, big-endian.
pub fn host_hash(identity: &HostIdentity) -> i64 {
    let digest = identity.digest();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(head)
}

/// How a host relates to the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostMode {
    /// Standalone or seed host.
    #[default]
    Host,
    /// Full peer that joined through another host.
    Join,
    /// Restricted, allow-listed relationship.
    Attach,
    /// Known by configuration only.
    Named,
}

impl fmt::Display for HostMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Host => "host",
            Self::Join => "join",
            Self::Attach => "attach",
            Self::Named => "named",
        };
        f.write_str(s)
    }
}

impl FromStr for HostMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "host" => Ok(Self::Host),
            "join" => Ok(Self::Join),
            "attach" => Ok(Self::Attach),
            "named" => Ok(Self::Named),
            other => Err(format!("unknown host mode '{other}'")),
        }
    }
}

/// Liveness as seen from this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HostState {
    #[default]
    Unknown,
    /// A probe has been sent.
    Pinged,
    /// The host answered.
    Known,
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "UNKNOWN",
            Self::Pinged => "PINGED",
            Self::Known => "KNOWN",
        };
        f.write_str(s)
    }
}

/// A host as exchanged on the wire and held in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostNode {
    pub key: HostKey,
    pub hash: i64,
    pub identity: HostIdentity,
    pub cluster_id: String,
    pub mode: HostMode,
    #[serde(default)]
    pub state: HostState,
    /// Milliseconds since the Unix epoch when the sender last refreshed
    /// this record. Newer wins.
    pub heartbeat: u64,
}

impl HostNode {
    pub fn new(identity: HostIdentity, cluster_id: impl Into<String>, mode: HostMode) -> Self {
        Self {
            key: HostKey::derive(&identity),
            hash: host_hash(&identity),
            identity,
            cluster_id: cluster_id.into(),
            mode,
            state: HostState::Unknown,
            heartbeat: now_millis(),
        }
    }

    #[must_use]
    pub fn with_heartbeat(mut self, heartbeat: u64) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn base_url(&self) -> String {
        self.identity.base_url()
    }

    /// Key recomputed from the identity matches the carried key.
    pub fn is_consistent(&self) -> bool {
        self.key == HostKey::derive(&self.identity)
    }
}

/// The local host: its node record plus how it should enter the cluster.
#[derive(Debug, Clone)]
pub struct HostSelf {
    pub node: HostNode,
    pub join_address: Option<String>,
    pub attach_address: Option<String>,
    /// Callers permitted to attach to this host. Empty allows any caller
    /// that presents the shared secret.
    pub attach_allow: Vec<String>,
}

impl HostSelf {
    pub fn key(&self) -> &HostKey {
        &self.node.key
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn identity() -> HostIdentity {
        HostIdentity {
            name: "node-a".into(),
            domain: "example.org".into(),
            lan_address: "10.0.0.5".into(),
            public_address: "".into(),
            http_port: 8983,
            https_port: 8984,
        }
    }

    #[test]
    fn test_key_is_hex_sha256() {
        let key = HostKey::derive(&identity());
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_field_boundaries_matter() {
        let a = HostIdentity {
            name: "ab".into(),
            domain: "c".into(),
            ..identity()
        };
        let b = HostIdentity {
            name: "a".into(),
            domain: "bc".into(),
            ..identity()
        };
        assert_ne!(HostKey::derive(&a), HostKey::derive(&b));
    }

    #[test]
    fn test_address_preference_and_self_match() {
        let id = identity();
        assert_eq!(id.base_url(), "http://10.0.0.5:8983");
        assert!(id.answers_to("10.0.0.5", 8983));
        assert!(id.answers_to("NODE-A", 8984));
        assert!(!id.answers_to("10.0.0.5", 9000));
        assert!(!id.answers_to("10.0.0.6", 8983));
        assert!(id.answers_to("node-a.example.org", 8983));
        assert!(!id.answers_to("node-b.example.org", 8983));
    }

    #[tokio::test]
    async fn test_resolved_self_addresses() {
        let id = HostIdentity {
            lan_address: "127.0.0.1".into(),
            ..identity()
        };
        assert!(id.resolves_to_self("node-a.example.org", 8983).await);
        assert!(id.resolves_to_self("localhost", 8983).await);
        assert!(id.resolves_to_self("[::1]", 8983).await);
        assert!(id.resolves_to_self("0.0.0.0", 8984).await);
        assert!(!id.resolves_to_self("localhost", 9000).await);
        assert!(!id.resolves_to_self("192.0.2.10", 8983).await);
    }

    #[test]
    fn test_wire_format() {
        let node = HostNode::new(identity(), "c1", HostMode::Join).with_heartbeat(5);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["mode"], "join");
        assert_eq!(json["key"], node.key.as_str());
        let back: HostNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
        assert!(back.is_consistent());
        assert_eq!("Attach".parse::<HostMode>(), Ok(HostMode::Attach));
        assert!("peer".parse::<HostMode>().is_err());
    }

    proptest! {
        #[test]
        fn prop_key_stable(name in "[a-z0-9.-]{0,16}", port in any::<u16>()) {
            let id = HostIdentity { name, http_port: port, ..identity() };
            prop_assert_eq!(HostKey::derive(&id), HostKey::derive(&id.clone()));
            // The numeric hash is the key's first 16 hex digits as a bit pattern.
            let head = u64::from_str_radix(&HostKey::derive(&id).as_str()[..16], 16).unwrap();
            prop_assert_eq!(head as i64, host_hash(&id));
        }
    }
}
