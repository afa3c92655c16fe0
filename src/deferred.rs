use crate::{
    scheduler::Scheduler,
    Error, Promise, Reject, Resolution, Resolve,
};
use std::sync::Arc;

/// A promise together with the capabilities that settle it from outside.
///
/// # Examples
///
/// ```
/// use futures::executor::block_on;
/// use promise_aplus::{scheduler, Deferred, Error};
/// use std::thread;
///
/// let deferred = Deferred::<String, Error>::new();
/// let promise = deferred.promise().clone();
/// let task = thread::spawn(move || deferred.resolve(String::from("Hi")));
/// task.join().expect("The task thread has panicked.");
/// scheduler::run_until_idle();
/// assert_eq!(block_on(promise), Ok(String::from("Hi")));
/// ```
#[derive(Debug)]
pub struct Deferred<T, E> {
    promise: Promise<T, E>,
    resolve: Resolve<T, E>,
    reject: Reject<T, E>,
}

impl<T, E> Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: From<Error> + Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self::from_promise(Promise::unbound())
    }

    /// A deferred whose promise dispatches reactions through `scheduler`.
    pub fn new_in(scheduler: Arc<dyn Scheduler>) -> Self {
        Self::from_promise(Promise::pending(scheduler))
    }

    fn from_promise(promise: Promise<T, E>) -> Self {
        let (resolve, reject) = promise.capabilities();
        Self {
            promise,
            resolve,
            reject,
        }
    }

    pub fn promise(&self) -> &Promise<T, E> {
        &self.promise
    }

    pub fn resolve(&self, value: impl Into<Resolution<T, E>>) {
        self.resolve.resolve(value)
    }

    pub fn reject(&self, reason: E) {
        self.reject.reject(reason)
    }

    pub fn into_parts(self) -> (Promise<T, E>, Resolve<T, E>, Reject<T, E>) {
        (self.promise, self.resolve, self.reject)
    }
}

impl<T, E> Default for Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: From<Error> + Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
