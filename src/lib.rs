//! Promises/A+ style deferred values.
//!
//! A [`Promise`] is settled at most once, by the capabilities its executor
//! receives or by a [`Deferred`]. Reactions never run inside the call that
//! registered or triggered them; they are handed to a [`Scheduler`] hook and
//! run in registration order. Resolving with another promise or with a
//! foreign [`Thenable`] adopts its outcome.
//!
//! # Examples
//!
//! ```
//! use futures::FutureExt;
//! use promise_aplus::{deferred, rejected, resolved, scheduler, Error, Promise, Resolution};
//!
//! let slow = deferred::<i32, Error>();
//! let two: Promise<i32, Error> = resolved(2);
//! let inputs: Vec<Resolution<i32, Error>> = vec![
//!     Resolution::Value(1),
//!     two.into(),
//!     slow.promise().clone().into(),
//! ];
//! let all = Promise::<i32, Error>::all(inputs);
//! let failed: Promise<i32, Error> = rejected::<i32, Error>(Error::reason("💥"))
//!     .catch(|reason: Error| Ok(reason.to_string().len() as i32));
//!
//! slow.resolve(3);
//! scheduler::run_until_idle();
//! assert_eq!(all.now_or_never(), Some(Ok(vec![1, 2, 3])));
//! assert_eq!(failed.now_or_never(), Some(Ok(4)));
//! ```
pub mod combinators;
mod deferred;
mod promise;
mod resolver;
pub mod scheduler;
mod thenable;

pub use combinators::Settled;
pub use deferred::Deferred;
pub use promise::{Finalize, Promise};
pub use resolver::{Reject, Resolve};
pub use scheduler::{Scheduler, Task, TickQueue};
pub use thenable::{Resolution, ThenFn, ThenLookup, Thenable};

/// Failures raised by the promise machinery itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A promise was resolved with itself.
    #[error("Chaining cycle detected for promise")]
    ChainingCycle,
    /// An executor, reaction or thenable panicked.
    #[error("promise callback panicked: {0}")]
    Panicked(String),
    /// An opaque rejection reason.
    #[error("{0}")]
    Reason(String),
}

impl Error {
    pub fn reason(reason: impl Into<String>) -> Self {
        Error::Reason(reason.into())
    }
}

/// A promise resolved with `value`.
pub fn resolved<T, E>(value: impl Into<Resolution<T, E>>) -> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: From<Error> + Clone + Send + 'static,
{
    Promise::resolve(value)
}

/// A promise rejected with `reason`.
pub fn rejected<T, E>(reason: E) -> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: From<Error> + Clone + Send + 'static,
{
    Promise::reject(reason)
}

/// A pending promise with its resolve/reject capabilities exposed.
pub fn deferred<T, E>() -> Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: From<Error> + Clone + Send + 'static,
{
    Deferred::new()
}
