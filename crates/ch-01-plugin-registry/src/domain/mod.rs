//! Domain layer: declarations and the monitoring capability.

pub mod monitor;
pub mod plugin_info;

pub use monitor::{MonitorRegistry, Monitorable};
pub use plugin_info::{PluginInfo, StartupMode};

use std::sync::Arc;

/// Base trait for every plugin family.
///
/// `as_monitorable` lets the registry discover the monitoring capability of
/// a trait object without knowing its concrete type.
pub trait Plugin: Send + Sync + 'static {
    fn as_monitorable(self: Arc<Self>) -> Option<Arc<dyn Monitorable>> {
        None
    }
}
