//! # CH-04 Core Cluster
//!
//! Membership between identical hosts. Each host derives a stable key from
//! its identity, keeps a registry of peers, and talks to them over plain
//! asynchronous HTTP fetches.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): [`HostKey`] derivation, [`HostNode`],
//!   the lock-free [`HostRegistry`] and [`ClusterConfig`]
//! - **Ports Layer** (`ports/`): [`Fetcher`] transport and
//!   [`FetchListener`] callback
//! - **Adapters Layer** (`adapters/`): [`ReqwestFetcher`]
//! - **Service** (`service.rs`): [`CoreCluster`]
//!
//! ## Host States
//!
//! | State | Meaning |
//! |-------|---------|
//! | `Unknown` | Added, or the last probe failed |
//! | `Pinged` | A probe is outstanding |
//! | `Known` | The last probe succeeded (the local host is always `Known`) |
//!
//! ## Handshake Endpoints
//!
//! | Request | Served by |
//! |---------|-----------|
//! | `GET /admin/cluster/ping` | [`CoreCluster::handle_ping`] |
//! | `POST /admin/cluster/join` | [`CoreCluster::handle_join`] |
//! | `POST /admin/cluster/attach` | [`CoreCluster::handle_attach`] |
//! | `GET /admin/cluster/hosts?mode=` | [`CoreCluster::handle_hosts`] |
//!
//! Outgoing handshakes carry `X-Cluster-Id` and, when configured,
//! `X-Cluster-Secret`.

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use adapters::ReqwestFetcher;
pub use domain::{
    ClusterConfig, HostIdentity, HostKey, HostMode, HostNode, HostRegistry, HostSelf, HostState,
};
pub use error::{ClusterError, ClusterResult};
pub use ports::{FetchListener, Fetcher, Headers};
pub use service::{
    AttachRequest, ClusterStats, CoreCluster, ATTACH_PATH, CLUSTER_ID_HEADER, HOSTS_PATH,
    JOIN_PATH, PING_PATH, SECRET_HEADER,
};
