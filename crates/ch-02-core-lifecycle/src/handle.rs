//! Scoped reference handle
//!
//! A [`RefHandle`] owns exactly one unit of a resource's open count. Dropping
//! it closes once; cloning it opens once. There is no way to detach the
//! reference from the handle, so every acquired reference is released.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use shared_types::CoreResult;

use crate::lifecycle::Managed;

/// Owned reference to a [`Managed`] resource.
pub struct RefHandle<T: Managed> {
    inner: Arc<T>,
}

impl<T: Managed> RefHandle<T> {
    /// Wrap a reference the caller already holds (for example the implicit
    /// initial reference of a freshly built resource).
    pub fn adopt(inner: Arc<T>) -> Self {
        Self { inner }
    }

    /// Open a new reference and wrap it.
    pub fn open(inner: &Arc<T>) -> CoreResult<Self> {
        inner.open()?;
        Ok(Self {
            inner: Arc::clone(inner),
        })
    }

    /// The shared resource. Holding the `Arc` does not hold a reference.
    pub fn arc(&self) -> &Arc<T> {
        &self.inner
    }

    /// Whether two handles point at the same resource.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl<T: Managed> Clone for RefHandle<T> {
    fn clone(&self) -> Self {
        if !self.inner.lifecycle().retain() {
            tracing::warn!(
                resource = %self.inner.lifecycle().name(),
                "[ch-02] Integrity: cloned a handle whose count is zero"
            );
        }
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Managed> Deref for RefHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: Managed> Drop for RefHandle<T> {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl<T: Managed> fmt::Debug for RefHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefHandle")
            .field("lifecycle", self.inner.lifecycle())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Lifecycle;
    use crate::LifecycleState;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Res {
        lifecycle: Lifecycle,
        teardowns: AtomicUsize,
    }

    impl Managed for Res {
        fn lifecycle(&self) -> &Lifecycle {
            &self.lifecycle
        }

        fn teardown(&self) {
            self.teardowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn inited() -> Arc<Res> {
        let res = Arc::new(Res {
            lifecycle: Lifecycle::new("res"),
            teardowns: AtomicUsize::new(0),
        });
        res.lifecycle.mark_inited().unwrap();
        res
    }

    #[test]
    fn test_drop_closes_once() {
        let res = inited();
        {
            let _h = RefHandle::open(&res).unwrap();
            assert_eq!(res.lifecycle.open_count(), 2);
        }
        assert_eq!(res.lifecycle.open_count(), 1);
        assert_eq!(res.teardowns.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_clone_opens_again() {
        let res = inited();
        let owner = RefHandle::adopt(Arc::clone(&res));
        let copy = owner.clone();
        assert!(RefHandle::ptr_eq(&owner, &copy));
        assert_eq!(res.lifecycle.open_count(), 2);

        drop(owner);
        assert_eq!(res.teardowns.load(Ordering::SeqCst), 0);
        drop(copy);
        assert_eq!(res.teardowns.load(Ordering::SeqCst), 1);
        assert_eq!(res.lifecycle.state(), LifecycleState::Closed);
    }

    #[test]
    fn test_open_on_closed_resource_fails() {
        let res = inited();
        drop(RefHandle::adopt(Arc::clone(&res)));
        assert!(RefHandle::open(&res).is_err());
    }
}
