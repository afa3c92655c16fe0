use crate::{
    resolver,
    scheduler::{self, Scheduler},
    Error, Reject, Resolution, Resolve, ThenLookup, Thenable,
};
use parking_lot::Mutex;
use std::{
    any::Any,
    fmt,
    future::Future,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, Waker},
};

/// A callback waiting for the outcome of a promise, and the scheduler it is
/// dispatched through.
struct Reaction<T, E> {
    scheduler: Arc<dyn Scheduler>,
    callback: Box<dyn Callback<T, E>>,
}

trait Callback<T, E>: Send {
    fn call(self: Box<Self>, outcome: Result<T, E>);

    /// Hands out the promise this callback would settle, if it owns one.
    fn detach(&mut self) -> Option<Box<dyn Link>>;
}

/// A callback that settles no promise of its own.
struct Plain<F>(F);

impl<T, E, F> Callback<T, E> for Plain<F>
where
    F: FnOnce(Result<T, E>) + Send,
{
    fn call(self: Box<Self>, outcome: Result<T, E>) {
        let Plain(reaction) = *self;
        reaction(outcome)
    }

    fn detach(&mut self) -> Option<Box<dyn Link>> {
        None
    }
}

/// A callback that settles `target`, kept outside the closure so a dying
/// chain can be taken apart link by link.
struct Forward<U, E, F> {
    target: Option<Promise<U, E>>,
    reaction: F,
}

impl<T, U, E, F> Callback<T, E> for Forward<U, E, F>
where
    U: Send + 'static,
    E: Send + 'static,
    F: FnOnce(Result<T, E>, Promise<U, E>) + Send,
{
    fn call(self: Box<Self>, outcome: Result<T, E>) {
        let Forward { target, reaction } = *self;
        if let Some(target) = target {
            reaction(outcome, target)
        }
    }

    fn detach(&mut self) -> Option<Box<dyn Link>> {
        self.target
            .take()
            .map(|target| Box::new(target) as Box<dyn Link>)
    }
}

/// A promise handle being dropped as part of a chain.
trait Link {
    /// Moves the promises fed by this one into `pile` if this is the last
    /// handle, then drops it.
    fn unlink(self: Box<Self>, pile: &mut Vec<Box<dyn Link>>);
}

impl<T, E> Link for Promise<T, E>
where
    T: 'static,
    E: 'static,
{
    fn unlink(mut self: Box<Self>, pile: &mut Vec<Box<dyn Link>>) {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            let inner = shared.inner.get_mut();
            pile.extend(inner.reactions.iter_mut().filter_map(|r| r.callback.detach()));
        }
    }
}

/// A single-assignment container for the eventual outcome of an operation.
///
/// Cloning a `Promise` clones the handle, not the instance: every clone
/// observes the same settlement. Reactions registered with [`then`],
/// [`catch`] or [`finally`] always run through a [`Scheduler`], never inside
/// the call that registered or settled them. That is the scheduler the
/// promise was created with by [`Promise::new_in`], or else the one current on
/// the thread that registered the reaction.
///
/// A promise is also a [`Future`] yielding `Result<T, E>`. Only reactions are
/// deferred: the state itself flips when `resolve` or `reject` is called, so
/// polling sees a settled promise before any scheduled task has run.
///
/// # Examples
///
/// ```
/// use futures::FutureExt;
/// use promise_aplus::{scheduler, Error, Promise};
///
/// let p = Promise::<i32, Error>::new(|resolve, _reject| {
///     resolve.resolve(20);
///     Ok(())
/// });
/// let plus_one: Promise<i32, Error> = p.and_then(|v| Ok(v + 1));
/// let q: Promise<i32, Error> = plus_one.and_then(|v| Ok(v * 2));
/// scheduler::run_until_idle();
/// assert_eq!(q.now_or_never(), Some(Ok(42)));
/// ```
///
/// [`then`]: Promise::then
/// [`catch`]: Promise::catch
/// [`finally`]: Promise::finally
pub struct Promise<T, E> {
    shared: Arc<Shared<T, E>>,
}

struct Shared<T, E> {
    inner: Mutex<Inner<T, E>>,
    /// Set by `new_in`. Otherwise reactions use the registering thread's
    /// current scheduler.
    scheduler: Option<Arc<dyn Scheduler>>,
}

enum State<T, E> {
    Pending,
    Fulfilled(T),
    Rejected(E),
}

struct Inner<T, E> {
    state: State<T, E>,
    /// Drained exactly once, when the state leaves `Pending`.
    reactions: Vec<Reaction<T, E>>,
    wakers: Vec<Waker>,
}

impl<T, E> Drop for Inner<T, E> {
    // Pending chains own their downstream promises through their reactions.
    // Unlink them from a worklist so a long chain does not drop recursively.
    fn drop(&mut self) {
        let mut pile: Vec<Box<dyn Link>> = self
            .reactions
            .iter_mut()
            .filter_map(|r| r.callback.detach())
            .collect();
        while let Some(link) = pile.pop() {
            link.unlink(&mut pile);
        }
    }
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: From<Error> + Clone + Send + 'static,
{
    /// Creates a promise driven by `executor`.
    ///
    /// The executor runs synchronously. An `Err` it returns, or a panic inside
    /// it, rejects the promise unless a capability already fired.
    pub fn new<F>(executor: F) -> Self
    where
        F: FnOnce(Resolve<T, E>, Reject<T, E>) -> Result<(), E>,
    {
        Self::start(Self::unbound(), executor)
    }

    /// Like [`Promise::new`], dispatching reactions through `scheduler`.
    /// Promises chained from it use the same scheduler.
    pub fn new_in<F>(scheduler: Arc<dyn Scheduler>, executor: F) -> Self
    where
        F: FnOnce(Resolve<T, E>, Reject<T, E>) -> Result<(), E>,
    {
        Self::start(Self::pending(scheduler), executor)
    }

    fn start<F>(promise: Self, executor: F) -> Self
    where
        F: FnOnce(Resolve<T, E>, Reject<T, E>) -> Result<(), E>,
    {
        let (resolve, reject) = promise.capabilities();
        let latch = reject.clone();
        if let Err(reason) = invoke(move || executor(resolve, reject)) {
            latch.reject(reason);
        }
        promise
    }

    /// A promise resolved with `value`. Promises and thenables are adopted.
    pub fn resolve(value: impl Into<Resolution<T, E>>) -> Self {
        Self::new(|resolve, _| {
            resolve.resolve(value);
            Ok(())
        })
    }

    /// A promise rejected with `reason`, taken as is.
    pub fn reject(reason: E) -> Self {
        Self::new(|_, reject| {
            reject.reject(reason);
            Ok(())
        })
    }

    /// Registers both reactions and returns the promise their result resolves.
    ///
    /// Whichever callback runs, an `Ok` return value goes through the
    /// resolution procedure of the returned promise (so returning another
    /// promise or a thenable chains onto it) and an `Err` rejects it.
    pub fn then<U, F, G, R1, R2>(&self, on_fulfilled: F, on_rejected: G) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<R1, E> + Send + 'static,
        G: FnOnce(E) -> Result<R2, E> + Send + 'static,
        R1: Into<Resolution<U, E>>,
        R2: Into<Resolution<U, E>>,
    {
        let next: Promise<U, E> = Promise::with_scheduler(self.shared.scheduler.clone());
        self.feed(next.clone(), move |outcome, target| {
            let result: Result<Resolution<U, E>, E> = match outcome {
                Ok(value) => invoke(move || on_fulfilled(value).map(Into::into)),
                Err(reason) => invoke(move || on_rejected(reason).map(Into::into)),
            };
            match result {
                Ok(x) => target.resolve_with(x),
                Err(reason) => target.settle_rejected(reason),
            }
        });
        next
    }

    /// `then` without a rejection handler: rejections pass through.
    pub fn and_then<U, F, R>(&self, on_fulfilled: F) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<R, E> + Send + 'static,
        R: Into<Resolution<U, E>>,
    {
        self.then(on_fulfilled, |reason| Err::<Resolution<U, E>, E>(reason))
    }

    /// `then` without a fulfillment handler: values pass through.
    pub fn catch<F, R>(&self, on_rejected: F) -> Promise<T, E>
    where
        F: FnOnce(E) -> Result<R, E> + Send + 'static,
        R: Into<Resolution<T, E>>,
    {
        self.then(
            |value| Ok::<Resolution<T, E>, E>(Resolution::Value(value)),
            on_rejected,
        )
    }

    /// Runs `on_finally` on either outcome and re-surfaces that outcome.
    ///
    /// If `on_finally` returns a promise, the original outcome is held back
    /// until it settles. Its rejection, or an `Err` from `on_finally` itself,
    /// replaces the original outcome.
    pub fn finally<F, R>(&self, on_finally: F) -> Promise<T, E>
    where
        F: FnOnce() -> Result<R, E> + Send + 'static,
        R: Finalize<E>,
    {
        let next: Promise<T, E> = Promise::with_scheduler(self.shared.scheduler.clone());
        self.feed(next.clone(), move |outcome, target| match invoke(on_finally) {
            Ok(waiting) => waiting.finalize(Box::new(move |done| match done {
                Ok(()) => target.settle(outcome),
                Err(reason) => target.settle_rejected(reason),
            })),
            Err(reason) => target.settle_rejected(reason),
        });
        next
    }

    /// Whether both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// A pending promise pinned to `scheduler`.
    pub(crate) fn pending(scheduler: Arc<dyn Scheduler>) -> Self {
        Self::with_scheduler(Some(scheduler))
    }

    /// A pending promise whose reactions follow the registering thread.
    pub(crate) fn unbound() -> Self {
        Self::with_scheduler(None)
    }

    fn with_scheduler(scheduler: Option<Arc<dyn Scheduler>>) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: State::Pending,
                    reactions: vec![],
                    wakers: vec![],
                }),
                scheduler,
            }),
        }
    }

    /// The scheduler a reaction registered or a job queued right now goes to.
    fn dispatcher(&self) -> Arc<dyn Scheduler> {
        match &self.shared.scheduler {
            Some(pinned) => pinned.clone(),
            None => scheduler::current(),
        }
    }

    pub(crate) fn capabilities(&self) -> (Resolve<T, E>, Reject<T, E>) {
        resolver::pair(self.clone())
    }

    /// Runs `reaction` with the outcome once settled, always from a
    /// scheduled task.
    pub(crate) fn subscribe(&self, reaction: impl FnOnce(Result<T, E>) + Send + 'static) {
        self.dispatch_or_queue(Box::new(Plain(reaction)))
    }

    /// Like `subscribe`, for a reaction that settles `target`.
    fn feed<U, F>(&self, target: Promise<U, E>, reaction: F)
    where
        U: Send + 'static,
        F: FnOnce(Result<T, E>, Promise<U, E>) + Send + 'static,
    {
        self.dispatch_or_queue(Box::new(Forward {
            target: Some(target),
            reaction,
        }))
    }

    fn dispatch_or_queue(&self, callback: Box<dyn Callback<T, E>>) {
        let reaction = Reaction {
            scheduler: self.dispatcher(),
            callback,
        };
        if let Err((reaction, outcome)) = self.register(reaction) {
            reaction.dispatch(outcome);
        }
    }

    /// Queues `reaction` while pending, otherwise hands it back with the
    /// settled outcome.
    fn register(&self, reaction: Reaction<T, E>) -> Result<(), (Reaction<T, E>, Result<T, E>)> {
        let mut guard = self.shared.inner.lock();
        let inner = &mut *guard;
        match &inner.state {
            State::Pending => {
                inner.reactions.push(reaction);
                Ok(())
            }
            State::Fulfilled(value) => Err((reaction, Ok(value.clone()))),
            State::Rejected(reason) => Err((reaction, Err(reason.clone()))),
        }
    }

    /// The resolution procedure.
    pub(crate) fn resolve_with(&self, x: Resolution<T, E>) {
        match x {
            Resolution::Value(value) => self.settle_fulfilled(value),
            Resolution::Promise(other) => self.adopt(other),
            Resolution::Thenable(thenable) => {
                // Adoption runs as its own task so nested thenables unwind
                // through the queue instead of the stack.
                let this = self.clone();
                self.dispatcher()
                    .schedule(Box::new(move || this.adopt_thenable(thenable)));
            }
        }
    }

    fn adopt(&self, other: Promise<T, E>) {
        if self.ptr_eq(&other) {
            tracing::debug!("promise resolved with itself");
            self.settle_rejected(Error::ChainingCycle.into());
            return;
        }
        let forward = Reaction {
            scheduler: other.dispatcher(),
            callback: Box::new(Forward {
                target: Some(self.clone()),
                reaction: |outcome: Result<T, E>, this: Promise<T, E>| this.settle(outcome),
            }),
        };
        // An already settled source is adopted on the spot.
        if let Err((forward, outcome)) = other.register(forward) {
            forward.callback.call(outcome);
        }
    }

    fn adopt_thenable(&self, thenable: Box<dyn Thenable<T, E>>) {
        match invoke(move || thenable.get_then()) {
            Ok(ThenLookup::Callable(then)) => {
                let (resolve, reject) = self.capabilities();
                let latch = reject.clone();
                if let Err(reason) = invoke(move || then(resolve, reject)) {
                    latch.reject(reason);
                }
            }
            Ok(ThenLookup::Plain(value)) => self.settle_fulfilled(value),
            Err(reason) => self.settle_rejected(reason),
        }
    }

    fn settle(&self, outcome: Result<T, E>) {
        match outcome {
            Ok(value) => self.settle_fulfilled(value),
            Err(reason) => self.settle_rejected(reason),
        }
    }

    pub(crate) fn settle_fulfilled(&self, value: T) {
        self.transition(State::Fulfilled(value))
    }

    pub(crate) fn settle_rejected(&self, reason: E) {
        self.transition(State::Rejected(reason))
    }

    fn transition(&self, settled: State<T, E>) {
        let (reactions, wakers, outcome) = {
            let mut inner = self.shared.inner.lock();
            if !matches!(inner.state, State::Pending) {
                tracing::trace!("promise already settled, ignoring");
                return;
            }
            let outcome = match &settled {
                State::Fulfilled(value) => Ok(value.clone()),
                State::Rejected(reason) => Err(reason.clone()),
                State::Pending => return,
            };
            inner.state = settled;
            (
                std::mem::take(&mut inner.reactions),
                std::mem::take(&mut inner.wakers),
                outcome,
            )
        };
        tracing::trace!(
            fulfilled = outcome.is_ok(),
            reactions = reactions.len(),
            "promise settled"
        );
        for waker in wakers {
            waker.wake();
        }
        for reaction in reactions {
            reaction.dispatch(outcome.clone());
        }
    }
}

impl<T, E> Reaction<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn dispatch(self, outcome: Result<T, E>) {
        let Reaction {
            scheduler,
            callback,
        } = self;
        scheduler.schedule(Box::new(move || callback.call(outcome)));
    }
}

/// What `on_finally` may hand back to [`Promise::finally`].
pub trait Finalize<E>: Send + 'static {
    /// Calls `done` once whatever `self` stands for has completed.
    fn finalize(self, done: Box<dyn FnOnce(Result<(), E>) + Send>);
}

impl<E> Finalize<E> for () {
    fn finalize(self, done: Box<dyn FnOnce(Result<(), E>) + Send>) {
        done(Ok(()))
    }
}

impl<V, E> Finalize<E> for Promise<V, E>
where
    V: Clone + Send + 'static,
    E: From<Error> + Clone + Send + 'static,
{
    fn finalize(self, done: Box<dyn FnOnce(Result<(), E>) + Send>) {
        self.subscribe(move |outcome| done(outcome.map(|_| ())))
    }
}

impl<T, E> Future for Promise<T, E>
where
    T: Clone,
    E: Clone,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut guard = self.shared.inner.lock();
        let inner = &mut *guard;
        match &inner.state {
            State::Fulfilled(value) => Poll::Ready(Ok(value.clone())),
            State::Rejected(reason) => Poll::Ready(Err(reason.clone())),
            State::Pending => {
                if !inner.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
                    inner.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.lock();
        match &inner.state {
            State::Pending => f.write_str("Promise { <pending> }"),
            State::Fulfilled(value) => f.debug_struct("Promise").field("fulfilled", value).finish(),
            State::Rejected(reason) => f.debug_struct("Promise").field("rejected", reason).finish(),
        }
    }
}

/// Runs a user callback, turning a panic into a rejection reason.
pub(crate) fn invoke<R, E>(f: impl FnOnce() -> Result<R, E>) -> Result<R, E>
where
    E: From<Error>,
{
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::warn!("promise callback panicked: {}", message);
        Err(Error::Panicked(message).into())
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".into()
    }
}
