//! Domain layer: lifecycle states and close hooks. No I/O.

pub mod hook;
pub mod state;

pub use hook::{CloseHook, HookError, HookResult};
pub use state::{CloseOutcome, LifecycleState};
