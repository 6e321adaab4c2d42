//! # CH-01 Plugin Registry
//!
//! Binds configuration-declared plugin names to live instances.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): [`PluginInfo`] declarations, the
//!   [`Plugin`] base trait, and the [`Monitorable`] capability with its
//!   [`MonitorRegistry`]
//! - **Factory** (`factory.rs`): [`FactoryRegistry`], explicit key →
//!   constructor map populated at start-up
//! - **Lazy** (`lazy.rs`): [`LazyPlugin`], exactly-once deferred creation
//! - **Registry** (`registry.rs`): [`PluginRegistry`] and [`PluginHandle`]
//!
//! ## Failure Semantics
//!
//! | Startup | Failure surfaces at | Effect |
//! |---------|---------------------|--------|
//! | `eager` | `PluginRegistry::load` | Whole load fails |
//! | `lazy`  | first `PluginHandle::get` | That call fails; next call retries |
//!
//! An unknown implementation key is rejected at `load` for both modes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let factories = Arc::new(FactoryRegistry::<dyn RequestHandler>::new());
//! factories.register("ping", |info| Ok(Arc::new(PingHandler::new(info)) as Arc<dyn RequestHandler>));
//!
//! let registry = PluginRegistry::new("core1", factories, Some(monitors));
//! registry.load(&infos)?;
//! let handler = registry.get("/admin/ping").map(|h| h.get()).transpose()?;
//! ```

pub mod domain;
pub mod error;
pub mod factory;
pub mod lazy;
pub mod registry;

pub use domain::{MonitorRegistry, Monitorable, Plugin, PluginInfo, StartupMode};
pub use error::PluginError;
pub use factory::{FactoryFn, FactoryRegistry};
pub use lazy::LazyPlugin;
pub use registry::{PluginHandle, PluginRegistry};
