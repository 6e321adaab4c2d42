//! Close hooks
//!
//! A hook is a named `(pre, post)` pair. The pre half runs while the
//! resource is still valid; the post half runs after the owner's teardown.

/// Error returned by a hook body.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a hook body.
pub type HookResult = Result<(), HookError>;

type HookFn = Box<dyn FnOnce() -> HookResult + Send>;

/// One entry in the close-hook chain.
pub struct CloseHook {
    name: String,
    pre: Option<HookFn>,
    post: Option<HookFn>,
}

impl CloseHook {
    /// A hook with neither half set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pre: None,
            post: None,
        }
    }

    /// Set the pre-close body.
    #[must_use]
    pub fn pre<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> HookResult + Send + 'static,
    {
        self.pre = Some(Box::new(f));
        self
    }

    /// Set the post-close body.
    #[must_use]
    pub fn post<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> HookResult + Send + 'static,
    {
        self.post = Some(Box::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn take_pre(&mut self) -> Option<HookFn> {
        self.pre.take()
    }

    pub(crate) fn take_post(&mut self) -> Option<HookFn> {
        self.post.take()
    }
}

impl std::fmt::Debug for CloseHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloseHook")
            .field("name", &self.name)
            .field("pre", &self.pre.is_some())
            .field("post", &self.post.is_some())
            .finish()
    }
}
