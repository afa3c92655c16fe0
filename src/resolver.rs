//! The resolve/reject capabilities handed to executors, deferreds and
//! thenables.
//!
//! A `Resolve` and its matching `Reject` share one latch: whichever is called
//! first wins, every later call to either is ignored. Both may be cloned and
//! sent across threads; clones share the latch too.
use crate::{Error, Promise, Resolution};
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Resolves its promise through the resolution procedure.
pub struct Resolve<T, E> {
    promise: Promise<T, E>,
    fired: Arc<AtomicBool>,
}

/// Rejects its promise with a reason, taken as is.
pub struct Reject<T, E> {
    promise: Promise<T, E>,
    fired: Arc<AtomicBool>,
}

pub(crate) fn pair<T, E>(promise: Promise<T, E>) -> (Resolve<T, E>, Reject<T, E>) {
    let fired = Arc::new(AtomicBool::new(false));
    (
        Resolve {
            promise: promise.clone(),
            fired: fired.clone(),
        },
        Reject { promise, fired },
    )
}

impl<T, E> Resolve<T, E>
where
    T: Clone + Send + 'static,
    E: From<Error> + Clone + Send + 'static,
{
    /// Resolves with a value, a promise to adopt, or a thenable.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::FutureExt;
    /// use promise_aplus::{deferred, scheduler, Error, Promise};
    ///
    /// let inner = deferred::<&str, Error>();
    /// let outer = Promise::<&str, Error>::new(|resolve, _| {
    ///     resolve.resolve(inner.promise().clone());
    ///     Ok(())
    /// });
    /// inner.resolve("🍓");
    /// scheduler::run_until_idle();
    /// assert_eq!(outer.now_or_never(), Some(Ok("🍓")));
    /// ```
    pub fn resolve(&self, value: impl Into<Resolution<T, E>>) {
        if self.fired.swap(true, Ordering::AcqRel) {
            tracing::trace!("resolve ignored, capability already used");
            return;
        }
        self.promise.resolve_with(value.into());
    }
}

impl<T, E> Reject<T, E>
where
    T: Clone + Send + 'static,
    E: From<Error> + Clone + Send + 'static,
{
    pub fn reject(&self, reason: E) {
        if self.fired.swap(true, Ordering::AcqRel) {
            tracing::trace!("reject ignored, capability already used");
            return;
        }
        self.promise.settle_rejected(reason);
    }
}

impl<T, E> Resolve<T, E> {
    /// Whether this capability pair has already been used.
    pub fn is_spent(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

impl<T, E> Reject<T, E> {
    /// Whether this capability pair has already been used.
    pub fn is_spent(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

impl<T, E> Clone for Resolve<T, E> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
            fired: self.fired.clone(),
        }
    }
}

impl<T, E> Clone for Reject<T, E> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
            fired: self.fired.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Resolve<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolve").field("spent", &self.is_spent()).finish()
    }
}

impl<T, E> fmt::Debug for Reject<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reject").field("spent", &self.is_spent()).finish()
    }
}
