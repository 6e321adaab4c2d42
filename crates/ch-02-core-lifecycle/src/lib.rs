//! # CH-02 Core Lifecycle
//!
//! Reference-counted lifecycle shared by every long-lived resource in the
//! host (cores first among them).
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): [`LifecycleState`], [`CloseHook`],
//!   [`CloseOutcome`]
//! - **Lifecycle** (`lifecycle.rs`): the atomic open count and close sequence,
//!   plus the [`Managed`] trait owners implement
//! - **Handle** (`handle.rs`): [`RefHandle`], the scoped reference
//!
//! ## Invariants
//!
//! | Rule | Enforcement |
//! |------|-------------|
//! | Teardown runs exactly once | Only the CAS that moves the count to 0 runs it |
//! | No open after zero | `open()` CAS refuses a zero count |
//! | Double close is harmless | Logged integrity warning, no state change |
//! | Hooks never block the chain | `catch_unwind` around every hook |
//!
//! ## Usage
//!
//! ```rust,ignore
//! let core = Arc::new(MyCore::new());           // count = 1
//! core.lifecycle().mark_inited()?;
//! let registered = RefHandle::adopt(core.clone());
//! let in_flight = RefHandle::open(&core)?;      // count = 2
//! drop(in_flight);                              // count = 1
//! drop(registered);                             // count = 0, teardown runs
//! ```

pub mod domain;
pub mod handle;
pub mod lifecycle;

pub use domain::{CloseHook, CloseOutcome, HookError, HookResult, LifecycleState};
pub use handle::RefHandle;
pub use lifecycle::{Lifecycle, Managed};
