//! # Core Runtime
//!
//! The multi-tenant host: named cores with pluggable handler tables,
//! grouped into per-role containers, administered over HTTP and joined
//! into a cluster of identical hosts.
//!
//! ## Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | `cores` | [`Core`], [`CoreDescriptor`], [`CoreConfig`], [`CoreFactory`], request routing |
//! | `container` | [`CoreContainer`] per role and the process-wide [`CoreContainers`] |
//! | `admin` | [`CoreAdmin`] and its [`AdminAction`]s |
//! | `handlers` | Built-in request handlers (`ping`, `echo`, `stats`) |
//! | `http` | The axum surface |
//! | `context` | [`ProcessContext`] shared by every core |
//!
//! ## Start-up
//!
//! ```text
//! CoreContainers::with_options(root)   store + cluster + context
//!   -> init()                          one container per role, cores built
//!   -> on_inited().await               settings, monitors, cluster join
//!   -> http::serve(...)                until the shutdown signal
//!   -> shutdown().await                eight guarded phases
//! ```

pub mod admin;
pub mod container;
pub mod context;
pub mod cores;
pub mod error;
pub mod handlers;
pub mod http;

pub use admin::{AdminAction, AdminRequest, CoreAdmin};
pub use container::{
    AdminConfig, ContainersOptions, CoreContainer, CoreContainers, InitFailure,
    CONTAINER_MONITOR_SCOPE, DEFAULT_CORE_NAME, DEFAULT_ROLE,
};
pub use context::ProcessContext;
pub use cores::{
    Core, CoreConfig, CoreDescriptor, CoreFactory, CoreRequest, RequestHandler,
    StandardCoreFactory,
};
pub use error::{AdminError, AdminResult};

#[cfg(test)]
pub(crate) mod test_support;
