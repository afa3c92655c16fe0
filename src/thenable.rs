//! What a promise can be resolved with: a plain value, another promise of the
//! same type, or a foreign object that exposes a `then` operation.
use crate::{Promise, Reject, Resolve};
use std::fmt;

/// A callable `then` member, invoked with the adopting promise's
/// capabilities.
pub type ThenFn<T, E> = Box<dyn FnOnce(Resolve<T, E>, Reject<T, E>) -> Result<(), E> + Send>;

/// Result of looking up the `then` member of a foreign object.
pub enum ThenLookup<T, E> {
    /// The member is callable; the object gets adopted through it.
    Callable(ThenFn<T, E>),
    /// No callable member; the object is just a value.
    Plain(T),
}

/// A foreign promise-like object.
///
/// Implementors report their `then` member through [`Thenable::get_then`].
/// Failing the lookup rejects the adopting promise, and so does a `then`
/// call that fails before either capability fired. Capabilities only honour
/// their first call, so a `then` that settles twice only settles once.
///
/// # Examples
///
/// ```
/// use futures::FutureExt;
/// use promise_aplus::{scheduler, Error, Promise, Resolution, ThenLookup, Thenable};
///
/// struct Ready(i32);
///
/// impl Thenable<i32, Error> for Ready {
///     fn get_then(self: Box<Self>) -> Result<ThenLookup<i32, Error>, Error> {
///         let value = self.0;
///         Ok(ThenLookup::Callable(Box::new(move |resolve, _reject| {
///             resolve.resolve(value);
///             Ok(())
///         })))
///     }
/// }
///
/// let p = Promise::<i32, Error>::resolve(Resolution::from_thenable(Ready(5)));
/// scheduler::run_until_idle();
/// assert_eq!(p.now_or_never(), Some(Ok(5)));
/// ```
pub trait Thenable<T, E>: Send + 'static {
    fn get_then(self: Box<Self>) -> Result<ThenLookup<T, E>, E>;
}

/// The value a promise is asked to resolve with.
pub enum Resolution<T, E> {
    Value(T),
    Promise(Promise<T, E>),
    Thenable(Box<dyn Thenable<T, E>>),
}

impl<T, E> Resolution<T, E> {
    pub fn from_thenable(thenable: impl Thenable<T, E>) -> Self {
        Resolution::Thenable(Box::new(thenable))
    }

    /// Builds an ad-hoc thenable whose `then` member is `then`.
    pub fn thenable<F>(then: F) -> Self
    where
        F: FnOnce(Resolve<T, E>, Reject<T, E>) -> Result<(), E> + Send + 'static,
        T: 'static,
        E: 'static,
    {
        Resolution::Thenable(Box::new(FnThenable(Box::new(then))))
    }
}

impl<T, E> From<T> for Resolution<T, E> {
    fn from(value: T) -> Self {
        Resolution::Value(value)
    }
}

impl<T, E> From<Promise<T, E>> for Resolution<T, E> {
    fn from(promise: Promise<T, E>) -> Self {
        Resolution::Promise(promise)
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolution::Promise(_) => f.write_str("Promise(..)"),
            Resolution::Thenable(_) => f.write_str("Thenable(..)"),
        }
    }
}

struct FnThenable<T, E>(ThenFn<T, E>);

impl<T: 'static, E: 'static> Thenable<T, E> for FnThenable<T, E> {
    fn get_then(self: Box<Self>) -> Result<ThenLookup<T, E>, E> {
        Ok(ThenLookup::Callable(self.0))
    }
}
