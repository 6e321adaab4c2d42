//! Cores: descriptors, configuration, construction and request routing.

pub mod config;
pub mod descriptor;
pub mod factory;
pub mod instance;
pub mod request;

pub use config::CoreConfig;
pub use descriptor::{validate_core_name, CoreDescriptor, DEFAULT_CONFIG_NAME, DEFAULT_FACTORY};
pub use factory::{CoreFactory, StandardCoreFactory};
pub use instance::{Core, CORE_MONITOR};
pub use request::{route_candidates, CoreRequest, RequestHandler};

#[cfg(test)]
mod tests;
