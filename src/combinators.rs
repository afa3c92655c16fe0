//! `race`, `all` and `all_settled`.
//!
//! Every input is either a plain value, which counts as settled on the spot,
//! or something that settles later. Thenables are first adopted by a fresh
//! promise. Inputs may settle while the iterator is still being walked, so
//! `all` and `all_settled` only finalize once the walk is over and every slot
//! it discovered has been filled.
use crate::{Error, Promise, Resolution};
use parking_lot::Mutex;
use std::sync::Arc;

/// Outcome record produced by [`Promise::all_settled`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled<T, E> {
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> Settled<T, E> {
    /// `"fulfilled"` or `"rejected"`.
    pub fn status(&self) -> &'static str {
        match self {
            Settled::Fulfilled(_) => "fulfilled",
            Settled::Rejected(_) => "rejected",
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Settled::Fulfilled(value) => Some(value),
            Settled::Rejected(_) => None,
        }
    }

    pub fn reason(&self) -> Option<&E> {
        match self {
            Settled::Fulfilled(_) => None,
            Settled::Rejected(reason) => Some(reason),
        }
    }
}

impl<T, E> From<Result<T, E>> for Settled<T, E> {
    fn from(outcome: Result<T, E>) -> Self {
        match outcome {
            Ok(value) => Settled::Fulfilled(value),
            Err(reason) => Settled::Rejected(reason),
        }
    }
}

enum Input<T, E> {
    Ready(T),
    Later(Promise<T, E>),
}

/// Slot bookkeeping shared by the input reactions of one combinator.
struct Tally<S> {
    slots: Vec<Option<S>>,
    settled: usize,
    exhausted: bool,
    finalized: bool,
}

impl<S> Tally<S> {
    fn new() -> Self {
        Self {
            slots: vec![],
            settled: 0,
            exhausted: false,
            finalized: false,
        }
    }

    fn push_ready(&mut self, item: S) {
        self.slots.push(Some(item));
        self.settled += 1;
    }

    fn reserve(&mut self) -> usize {
        self.slots.push(None);
        self.slots.len() - 1
    }

    fn fill(&mut self, index: usize, item: S) -> Option<Vec<S>> {
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.replace(item).is_none() {
                self.settled += 1;
            }
        }
        self.try_finalize()
    }

    /// Marks the input as fully walked.
    fn finish(&mut self) -> Option<Vec<S>> {
        self.exhausted = true;
        self.try_finalize()
    }

    fn try_finalize(&mut self) -> Option<Vec<S>> {
        if self.finalized || !self.exhausted || self.settled != self.slots.len() {
            return None;
        }
        self.finalized = true;
        Some(std::mem::take(&mut self.slots).into_iter().flatten().collect())
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: From<Error> + Clone + Send + 'static,
{
    /// Settles like the first input to settle.
    ///
    /// Plain values settle immediately, in iteration order, so the first
    /// plain value wins over every input that is still pending.
    pub fn race<I>(items: I) -> Promise<T, E>
    where
        I: IntoIterator,
        I::Item: Into<Resolution<T, E>>,
    {
        let race: Promise<T, E> = Promise::unbound();
        let (resolve, reject) = race.capabilities();
        for item in items {
            match classify(item.into()) {
                Input::Ready(value) => resolve.resolve(Resolution::Value(value)),
                Input::Later(promise) => {
                    let (resolve, reject) = (resolve.clone(), reject.clone());
                    promise.subscribe(move |outcome| match outcome {
                        Ok(value) => resolve.resolve(Resolution::Value(value)),
                        Err(reason) => reject.reject(reason),
                    });
                }
            }
        }
        race
    }

    /// Fulfills with every value, in input order, once all inputs fulfilled.
    /// Rejects with the first rejection to arrive.
    pub fn all<I>(items: I) -> Promise<Vec<T>, E>
    where
        I: IntoIterator,
        I::Item: Into<Resolution<T, E>>,
    {
        let all: Promise<Vec<T>, E> = Promise::unbound();
        let (resolve, reject) = all.capabilities();
        let tally = Arc::new(Mutex::new(Tally::new()));
        for item in items {
            match classify(item.into()) {
                Input::Ready(value) => tally.lock().push_ready(value),
                Input::Later(promise) => {
                    let index = tally.lock().reserve();
                    let (tally, resolve, reject) = (tally.clone(), resolve.clone(), reject.clone());
                    promise.subscribe(move |outcome| match outcome {
                        Ok(value) => {
                            let values = tally.lock().fill(index, value);
                            if let Some(values) = values {
                                resolve.resolve(Resolution::Value(values));
                            }
                        }
                        Err(reason) => reject.reject(reason),
                    });
                }
            }
        }
        let values = tally.lock().finish();
        if let Some(values) = values {
            resolve.resolve(Resolution::Value(values));
        }
        all
    }

    /// Fulfills with the outcome of every input, in input order, once all of
    /// them settled. Never rejects.
    pub fn all_settled<I>(items: I) -> Promise<Vec<Settled<T, E>>, E>
    where
        I: IntoIterator,
        I::Item: Into<Resolution<T, E>>,
    {
        let all: Promise<Vec<Settled<T, E>>, E> = Promise::unbound();
        let (resolve, _reject) = all.capabilities();
        let tally = Arc::new(Mutex::new(Tally::new()));
        for item in items {
            match classify(item.into()) {
                Input::Ready(value) => tally.lock().push_ready(Settled::Fulfilled(value)),
                Input::Later(promise) => {
                    let index = tally.lock().reserve();
                    let (tally, resolve) = (tally.clone(), resolve.clone());
                    promise.subscribe(move |outcome| {
                        let outcomes = tally.lock().fill(index, Settled::from(outcome));
                        if let Some(outcomes) = outcomes {
                            resolve.resolve(Resolution::Value(outcomes));
                        }
                    });
                }
            }
        }
        let outcomes = tally.lock().finish();
        if let Some(outcomes) = outcomes {
            resolve.resolve(Resolution::Value(outcomes));
        }
        all
    }
}

fn classify<T, E>(item: Resolution<T, E>) -> Input<T, E>
where
    T: Clone + Send + 'static,
    E: From<Error> + Clone + Send + 'static,
{
    match item {
        Resolution::Value(value) => Input::Ready(value),
        Resolution::Promise(promise) => Input::Later(promise),
        thenable @ Resolution::Thenable(_) => {
            let promise: Promise<T, E> = Promise::unbound();
            promise.resolve_with(thenable);
            Input::Later(promise)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_waits_for_the_walk_to_finish() {
        let mut tally = Tally::new();
        let first = tally.reserve();
        assert_eq!(tally.fill(first, "a"), None);
        tally.push_ready("b");
        assert_eq!(tally.finish(), Some(vec!["a", "b"]));
    }

    #[test]
    fn test_tally_finalizes_once() {
        let mut tally = Tally::new();
        let first = tally.reserve();
        assert_eq!(tally.finish(), None);
        assert_eq!(tally.fill(first, 1), Some(vec![1]));
        assert_eq!(tally.fill(first, 2), None);
        assert_eq!(tally.finish(), None);
    }

    #[test]
    fn test_empty_tally_finalizes_on_finish() {
        let mut tally = Tally::<u8>::new();
        assert_eq!(tally.finish(), Some(vec![]));
    }

    #[test]
    fn test_settled_status() {
        let ok: Settled<i32, Error> = Ok(1).into();
        let err: Settled<i32, Error> = Err(Error::reason("e")).into();
        assert_eq!(ok.status(), "fulfilled");
        assert_eq!(ok.value(), Some(&1));
        assert_eq!(err.status(), "rejected");
        assert_eq!(err.reason(), Some(&Error::reason("e")));
    }
}
