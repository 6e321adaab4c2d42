//! Core containers: the per-role registration maps and the process-wide
//! set that owns them.

pub mod config;
pub mod containers;
pub mod core_container;

pub use config::{AdminConfig, DEFAULT_CORE_NAME, DEFAULT_ROLE};
pub use containers::{ContainersOptions, CoreContainers, SETTINGS_DOC};
pub use core_container::{CoreContainer, InitFailure, CONTAINER_MONITOR_SCOPE};
