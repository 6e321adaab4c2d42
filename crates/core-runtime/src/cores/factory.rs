//! Core construction strategies
//!
//! Each `roles.<role>.cores[]` entry names a factory key (default
//! `"default"`). Factories are registered on the [`ProcessContext`] at
//! start-up; an unknown key is a configuration error for that core only.

use std::sync::Arc;

use shared_types::CoreResult;

use super::config::CoreConfig;
use super::descriptor::CoreDescriptor;
use super::instance::Core;
use crate::context::ProcessContext;

/// Builds a core in the `Created` state. The caller runs
/// [`Core::on_inited`].
pub trait CoreFactory: Send + Sync {
    fn create(&self, descriptor: &CoreDescriptor, ctx: &ProcessContext) -> CoreResult<Arc<Core>>;
}

/// Loads the core configuration from the descriptor and builds a plain
/// core around it.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardCoreFactory;

impl CoreFactory for StandardCoreFactory {
    fn create(&self, descriptor: &CoreDescriptor, ctx: &ProcessContext) -> CoreResult<Arc<Core>> {
        let config = CoreConfig::load(descriptor)?;
        Ok(Arc::new(Core::new(descriptor.clone(), config, ctx)))
    }
}
