//! Work item structure and execution modes

use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// How a work item is dispatched
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DispatchMode {
    /// Blocking dispatch: the submitter waits for completion and receives
    /// any captured panic
    Send,
    /// Fire-and-forget dispatch: nobody waits, and a panic is not caught
    Post,
}

/// The unit of work carried by an item
type Thunk = Box<dyn FnOnce() + Send>;

/// Binary completion signal, initially unset, set exactly once
///
/// Submitters block on this instead of polling; the worker sets it after the
/// item has run. Safe to wait on and set from different threads.
pub struct CompletionSignal {
    /// Completion flag guarded by the mutex
    done: Mutex<bool>,

    /// Signaled when the flag flips
    cond: Condvar,
}

impl CompletionSignal {
    /// Create an unset signal
    pub fn new() -> Self {
        Self {
            done: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Set the signal and wake all waiters
    pub fn set(&self) {
        let mut done = self.done.lock();
        *done = true;
        self.cond.notify_all();
    }

    /// Block until the signal is set
    pub fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.cond.wait(&mut done);
        }
    }

    /// Block until the signal is set or `timeout` elapses
    ///
    /// Returns `true` if the signal was set within the timeout.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut done = self.done.lock();
        while !*done {
            if self.cond.wait_until(&mut done, deadline).timed_out() {
                return *done;
            }
        }
        true
    }

    /// Check the signal without blocking
    pub fn is_set(&self) -> bool {
        *self.done.lock()
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// One queued unit of work plus its dispatch mode and completion tracking
///
/// The submitter's state travels inside the closure; the item itself only
/// tracks execution. A `Send` item captures a panicking closure's payload so
/// the submitter can re-raise it; a `Post` item runs unguarded and a panic
/// unwinds the worker thread.
pub struct WorkItem {
    /// The closure, taken and invoked exactly once
    thunk: Mutex<Option<Thunk>>,

    /// Dispatch mode
    mode: DispatchMode,

    /// Set once execution has finished, successfully or not
    completion: CompletionSignal,

    /// Panic payload captured during a `Send` execution
    panic: Mutex<Option<Box<dyn Any + Send>>>,
}

impl WorkItem {
    /// Create a new item wrapping `f`
    pub fn new<F>(mode: DispatchMode, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            thunk: Mutex::new(Some(Box::new(f))),
            mode,
            completion: CompletionSignal::new(),
            panic: Mutex::new(None),
        }
    }

    /// Get the dispatch mode
    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Run the wrapped closure; must be called on the worker thread
    ///
    /// `Send` mode wraps execution in a panic-capturing boundary and sets the
    /// completion signal unconditionally afterwards, so no submitter can
    /// block forever once execution has begun. `Post` mode is unguarded: a
    /// panic escapes into the worker loop and terminates the worker.
    pub fn execute(&self) {
        match self.mode {
            DispatchMode::Send => self.run_guarded(),
            DispatchMode::Post => self.run_unguarded(),
        }
    }

    /// `Send` execution: capture a panic, then always signal completion
    fn run_guarded(&self) {
        let thunk = match self.take_thunk() {
            Some(thunk) => thunk,
            None => return,
        };

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(thunk)) {
            *self.panic.lock() = Some(payload);
        }
        self.completion.set();
    }

    /// `Post` execution: nobody is waiting, nothing is caught
    fn run_unguarded(&self) {
        if let Some(thunk) = self.take_thunk() {
            thunk();
        }
    }

    /// Take the closure, guaranteeing at-most-once execution
    fn take_thunk(&self) -> Option<Thunk> {
        self.thunk.lock().take()
    }

    /// Get the completion signal
    pub fn completion(&self) -> &CompletionSignal {
        &self.completion
    }

    /// Check whether execution captured a panic
    pub fn panicked(&self) -> bool {
        self.panic.lock().is_some()
    }

    /// Take the captured panic payload (if any) for re-raising
    pub fn take_panic(&self) -> Option<Box<dyn Any + Send>> {
        self.panic.lock().take()
    }
}
