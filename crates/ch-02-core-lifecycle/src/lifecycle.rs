//! Reference-counted lifecycle
//!
//! The open count starts at 1 (the creator's reference). `open()` and
//! `close()` are compare-and-swap loops, so concurrent callers never lose an
//! update and the transition to zero is observed by exactly one caller. That
//! caller runs the close sequence:
//!
//! 1. state → `Closing`
//! 2. pre-close hooks, in registration order
//! 3. owner teardown
//! 4. post-close hooks, in registration order
//! 5. state → `Closed`
//!
//! Every hook and the teardown run under `catch_unwind`; a failure is logged
//! and the sequence continues.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use parking_lot::Mutex;
use shared_types::{CoreError, CoreResult};
use tracing::{debug, warn};

use crate::domain::{CloseHook, CloseOutcome, HookResult, LifecycleState};

/// Lifecycle bookkeeping embedded in a managed resource.
pub struct Lifecycle {
    name: String,
    state: AtomicU8,
    count: AtomicUsize,
    hooks: Mutex<Vec<CloseHook>>,
}

impl Lifecycle {
    /// A fresh lifecycle in `Created` with an open count of 1.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: AtomicU8::new(LifecycleState::Created as u8),
            count: AtomicUsize::new(1),
            hooks: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Current open count.
    pub fn open_count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.state().is_shutting_down()
    }

    /// `Created → Inited`. Any other starting state is a contract violation.
    pub fn mark_inited(&self) -> CoreResult<()> {
        match self.state.compare_exchange(
            LifecycleState::Created as u8,
            LifecycleState::Inited as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                debug!("[ch-02] {} inited", self.name);
                Ok(())
            }
            Err(raw) => {
                let current = LifecycleState::from_u8(raw);
                let message = if current == LifecycleState::Inited {
                    "already initialized".to_string()
                } else {
                    format!("cannot initialize in state {current}")
                };
                Err(CoreError::contract(self.name.clone(), message))
            }
        }
    }

    /// Fails unless the resource is `Inited`.
    pub fn ensure_inited(&self) -> CoreResult<()> {
        match self.state() {
            LifecycleState::Inited => Ok(()),
            LifecycleState::Created => Err(CoreError::contract(
                self.name.clone(),
                "used before initialization",
            )),
            state => Err(CoreError::contract(
                self.name.clone(),
                format!("used after close (state {state})"),
            )),
        }
    }

    /// Take an additional reference. Valid only while `Inited` and the count
    /// has not reached zero.
    pub fn open(&self) -> CoreResult<()> {
        self.ensure_inited()?;
        if self.retain() {
            Ok(())
        } else {
            Err(CoreError::contract(self.name.clone(), "open after close"))
        }
    }

    /// Increment if the count is still positive. Ignores the state, so a
    /// holder of an existing reference can always duplicate it.
    pub(crate) fn retain(&self) -> bool {
        let mut current = self.count.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return false;
            }
            match self.count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Register a close hook. Rejected once closing has started.
    pub fn add_close_hook(&self, hook: CloseHook) -> CoreResult<()> {
        let mut hooks = self.hooks.lock();
        if self.state().is_shutting_down() {
            return Err(CoreError::contract(
                self.name.clone(),
                format!("close hook '{}' added after close", hook.name()),
            ));
        }
        hooks.push(hook);
        Ok(())
    }

    /// Drop one reference. The call that reaches zero runs the close
    /// sequence with `teardown` as the owner step.
    pub fn release<F: FnOnce()>(&self, teardown: F) -> CloseOutcome {
        let mut current = self.count.load(Ordering::Acquire);
        loop {
            if current == 0 {
                warn!(
                    resource = %self.name,
                    "[ch-02] Integrity: close() called with open count already zero"
                );
                return CloseOutcome::AlreadyClosed;
            }
            match self.count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        let remaining = current - 1;
        if remaining > 0 {
            return CloseOutcome::Released { remaining };
        }

        self.run_close_sequence(teardown);
        CloseOutcome::TornDown
    }

    fn run_close_sequence<F: FnOnce()>(&self, teardown: F) {
        self.state
            .store(LifecycleState::Closing as u8, Ordering::Release);
        let mut hooks = std::mem::take(&mut *self.hooks.lock());

        for hook in hooks.iter_mut() {
            if let Some(pre) = hook.take_pre() {
                self.run_guarded(hook.name(), "pre-close", pre);
            }
        }

        if let Err(panic) = catch_unwind(AssertUnwindSafe(teardown)) {
            warn!(
                resource = %self.name,
                panic = %panic_message(panic.as_ref()),
                "[ch-02] Teardown panicked"
            );
        }

        for hook in hooks.iter_mut() {
            if let Some(post) = hook.take_post() {
                self.run_guarded(hook.name(), "post-close", post);
            }
        }

        self.state.store(LifecycleState::Closed as u8, Ordering::Release);
        debug!("[ch-02] {} closed", self.name);
    }

    fn run_guarded(&self, hook: &str, phase: &str, body: Box<dyn FnOnce() -> HookResult + Send>) {
        match catch_unwind(AssertUnwindSafe(body)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(
                resource = %self.name,
                hook,
                phase,
                error = %e,
                "[ch-02] Close hook failed"
            ),
            Err(panic) => warn!(
                resource = %self.name,
                hook,
                phase,
                panic = %panic_message(panic.as_ref()),
                "[ch-02] Close hook panicked"
            ),
        }
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("open_count", &self.open_count())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// A resource whose release is governed by an embedded [`Lifecycle`].
pub trait Managed: Send + Sync {
    fn lifecycle(&self) -> &Lifecycle;

    /// Owner-specific teardown, run once between the pre and post hooks.
    fn teardown(&self) {}

    fn open(&self) -> CoreResult<()> {
        self.lifecycle().open()
    }

    fn close(&self) -> CloseOutcome {
        self.lifecycle().release(|| self.teardown())
    }
}
