//! Built-in request handlers
//!
//! | Key | Handler | Response |
//! |-----|---------|----------|
//! | `ping` | [`PingHandler`] | `status = OK` and the core name |
//! | `echo` | [`EchoHandler`] | the request params and body |
//! | `stats` | [`StatsHandler`] | the core's description |
//!
//! Every core's `plugins[]` may reference these keys.

mod builtin;

pub use builtin::{EchoHandler, PingHandler, StatsHandler};

use std::sync::Arc;

use ch_01_plugin_registry::FactoryRegistry;

use crate::cores::RequestHandler;

/// Register the built-in handler factories.
pub fn register_builtins(factories: &FactoryRegistry<dyn RequestHandler>) {
    factories.register("ping", |info| {
        Ok(Arc::new(PingHandler::new(info)) as Arc<dyn RequestHandler>)
    });
    factories.register("echo", |info| {
        Ok(Arc::new(EchoHandler::new(info)) as Arc<dyn RequestHandler>)
    });
    factories.register("stats", |_| Ok(Arc::new(StatsHandler) as Arc<dyn RequestHandler>));
}
