//! The defer-to-next-tick hook every promise dispatches its reactions through.
//!
//! A [`Scheduler`] only has to promise one thing: a scheduled task runs later,
//! never inside the call that scheduled it, and tasks run in the order they
//! were scheduled. Hosts plug in their own event loop by implementing the
//! trait (closures `Fn(Task)` already do). Without one, every thread falls
//! back to its own [`TickQueue`], which is drained explicitly with
//! [`run_until_idle`]. A reaction goes to the scheduler current on the thread
//! that registered it, so a promise created on one thread and chained on
//! another is drained by the second.
//!
//! # Examples
//!
//! ```
//! use futures::FutureExt;
//! use promise_aplus::{scheduler, Error, Promise};
//!
//! let one = Promise::<i32, Error>::resolve(1);
//! let doubled: Promise<i32, Error> = one.and_then(|v| Ok(v * 2));
//! // Nothing runs until the tick is driven.
//! assert_eq!(doubled.clone().now_or_never(), None);
//! assert_eq!(scheduler::run_until_idle(), 1);
//! assert_eq!(doubled.now_or_never(), Some(Ok(2)));
//! ```
use parking_lot::Mutex;
use std::{cell::RefCell, collections::VecDeque, fmt, sync::Arc};

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Scheduler: Send + Sync {
    /// Queue `task` to run after the current synchronous context.
    fn schedule(&self, task: Task);
}

impl<F> Scheduler for F
where
    F: Fn(Task) + Send + Sync,
{
    fn schedule(&self, task: Task) {
        self(task)
    }
}

/// FIFO task queue, drained by whoever owns the "tick".
#[derive(Default)]
pub struct TickQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl TickQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Runs queued tasks, including the ones they queue, until the queue is
    /// empty. Returns how many tasks ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        // The lock is released before each task runs so tasks can schedule more.
        while let Some(task) = self.pop() {
            task();
            ran += 1;
        }
        ran
    }

    /// Runs at most one task. Returns `false` if the queue was empty.
    pub fn run_one(&self) -> bool {
        match self.pop() {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    fn pop(&self) -> Option<Task> {
        self.tasks.lock().pop_front()
    }
}

impl Scheduler for TickQueue {
    fn schedule(&self, task: Task) {
        self.tasks.lock().push_back(task);
    }
}

impl fmt::Debug for TickQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickQueue").field("len", &self.len()).finish()
    }
}

thread_local! {
    static DEFAULT_QUEUE: Arc<TickQueue> = TickQueue::new();
    static CURRENT: RefCell<Option<Arc<dyn Scheduler>>> = const { RefCell::new(None) };
}

/// The scheduler reactions registered on this thread are dispatched through.
pub fn current() -> Arc<dyn Scheduler> {
    CURRENT
        .with(|current| current.borrow().clone())
        .unwrap_or_else(|| default_queue() as Arc<dyn Scheduler>)
}

/// This thread's fallback queue, used whenever no scheduler is installed.
pub fn default_queue() -> Arc<TickQueue> {
    DEFAULT_QUEUE.with(Arc::clone)
}

/// Drains this thread's default queue. Returns how many tasks ran.
pub fn run_until_idle() -> usize {
    default_queue().run_until_idle()
}

/// Installs `scheduler` for reactions registered on this thread until the
/// returned guard is dropped. Promises created with `new_in` keep their own.
pub fn set_current(scheduler: Arc<dyn Scheduler>) -> SchedulerGuard {
    let previous = CURRENT.with(|current| current.borrow_mut().replace(scheduler));
    SchedulerGuard { previous }
}

/// Restores the previously installed scheduler on drop.
#[must_use = "the scheduler is uninstalled as soon as the guard is dropped"]
pub struct SchedulerGuard {
    previous: Option<Arc<dyn Scheduler>>,
}

impl Drop for SchedulerGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| *current.borrow_mut() = previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_tick_queue_runs_in_order() {
        let queue = TickQueue::new();
        let log = Arc::new(Mutex::new(vec![]));
        for i in 0..3 {
            let log = log.clone();
            queue.schedule(Box::new(move || log.lock().push(i)));
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.run_until_idle(), 3);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_tasks_scheduled_while_draining_run_last() {
        let queue = TickQueue::new();
        let log = Arc::new(Mutex::new(vec![]));
        let (q, l) = (queue.clone(), log.clone());
        queue.schedule(Box::new(move || {
            l.lock().push("outer");
            let l = l.clone();
            q.schedule(Box::new(move || l.lock().push("nested")));
        }));
        let l = log.clone();
        queue.schedule(Box::new(move || l.lock().push("second")));
        assert!(queue.run_one());
        assert_eq!(queue.run_until_idle(), 2);
        assert_eq!(*log.lock(), vec!["outer", "second", "nested"]);
    }

    #[test]
    fn test_set_current_is_restored_on_drop() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let custom: Arc<dyn Scheduler> = Arc::new(move |task: Task| {
            counter.fetch_add(1, Ordering::SeqCst);
            task()
        });
        {
            let _guard = set_current(custom);
            current().schedule(Box::new(|| {}));
        }
        current().schedule(Box::new(|| {}));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(run_until_idle(), 1);
    }
}
