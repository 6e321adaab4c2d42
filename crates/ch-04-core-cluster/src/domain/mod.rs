pub mod config;
pub mod host;
pub mod registry;

pub use config::{address_url, parse_address, ClusterConfig};
pub use host::{now_millis, HostIdentity, RESOLVE_TIMEOUT, HostKey, HostMode, HostNode, HostSelf, HostState};
pub use registry::{HostRegistry, Upsert};
