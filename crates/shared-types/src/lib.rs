//! # Shared Types Crate
//!
//! Types every Core Host subsystem speaks:
//!
//! - [`CoreError`]: the tagged error taxonomy. Configuration errors, I/O
//!   failures and contract violations are distinct variants so callers can
//!   pattern-match instead of inspecting codes.
//! - [`NamedList`]: the ordered, name-repeating property document used for
//!   plugin init args, handler responses and persisted settings.
//! - [`ConfigNode`] / [`ConfigSource`]: the declarative configuration tree,
//!   addressed by dotted paths and otherwise opaque to its consumers.

pub mod config;
pub mod errors;
pub mod named_list;

pub use config::{ConfigNode, ConfigSource, FileConfigSource, InlineConfigSource};
pub use errors::*;
pub use named_list::{NamedList, Value};
