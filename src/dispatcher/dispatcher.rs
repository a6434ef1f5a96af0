//! Dispatcher façade coordinating the worker and the handoff queue

use crate::dispatcher::{DispatchMode, WorkItem, Worker};
use crate::queue::HandoffQueue;
use crate::{DispatchError, DispatchResult};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

/// Default name for the worker thread
const DEFAULT_THREAD_NAME: &str = "apartment-worker";

/// Single-owner execution context
///
/// Owns one worker thread and the queue feeding it. Any thread may submit
/// work; items run on the worker strictly one at a time, in submission
/// order.
///
/// A panic inside a [`post`](Self::post)ed closure is not caught and
/// terminates the worker thread. Fire-and-forget work is trusted not to
/// panic; once the worker is gone, every later dispatch returns
/// [`DispatchError::WorkerGone`]. Use [`send`](Self::send) when the failure
/// belongs to the submitter.
pub struct Dispatcher {
    /// Handoff queue shared with the worker
    queue: Arc<HandoffQueue<Arc<WorkItem>>>,

    /// The one dedicated worker
    worker: Worker,

    /// Set by `shutdown`; all dispatch afterwards is a precondition violation
    disposed: AtomicBool,
}

impl Dispatcher {
    /// Create a dispatcher and start its worker thread
    pub fn new() -> Self {
        Self::with_thread_name(DEFAULT_THREAD_NAME)
    }

    /// Create a dispatcher whose worker thread carries `name`
    pub fn with_thread_name(name: impl Into<String>) -> Self {
        let queue = Arc::new(HandoffQueue::new());
        let mut worker = Worker::new(queue.clone(), name);
        worker.start();

        Self {
            queue,
            worker,
            disposed: AtomicBool::new(false),
        }
    }

    /// Run `f` on the worker thread and block until it has finished
    ///
    /// A panic raised by `f` is captured on the worker and re-raised here,
    /// on the calling thread, with its payload intact. When called from the
    /// worker thread itself, `f` runs inline without enqueueing; this is
    /// what keeps a send-from-within-send from deadlocking.
    pub fn send<F>(&self, f: F) -> DispatchResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.assert_usable();

        if self.is_worker_thread() {
            f();
            return Ok(());
        }

        if !self.worker.is_running() {
            return Err(DispatchError::WorkerGone);
        }

        let item = Arc::new(WorkItem::new(DispatchMode::Send, f));
        self.queue.enqueue(item.clone())?;
        item.completion().wait();

        if let Some(payload) = item.take_panic() {
            panic::resume_unwind(payload);
        }
        Ok(())
    }

    /// Run `f` on the worker thread, waiting at most `timeout`
    ///
    /// On timeout the item is withdrawn from the queue (best-effort) and the
    /// call returns `Ok(())` with no indication of whether `f` ran; if the
    /// worker had already claimed the item, it runs to completion untracked.
    /// A panic captured before the withdrawal attempt is still re-raised
    /// here. Timing out is a normal return, never an error.
    pub fn send_timeout<F>(&self, f: F, timeout: Duration) -> DispatchResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.assert_usable();

        if self.is_worker_thread() {
            f();
            return Ok(());
        }

        if !self.worker.is_running() {
            return Err(DispatchError::WorkerGone);
        }

        let item = Arc::new(WorkItem::new(DispatchMode::Send, f));
        self.queue.enqueue(item.clone())?;

        if !item.completion().wait_for(timeout) {
            // No-op if the worker got there first; the race is accepted and
            // a failure captured with no listener is dropped
            self.queue.remove(&item);
        }

        if let Some(payload) = item.take_panic() {
            panic::resume_unwind(payload);
        }
        Ok(())
    }

    /// Enqueue `f` for the worker and return immediately
    ///
    /// Runs after all previously enqueued items, in enqueue order. Nothing
    /// is reported back to the caller; a panic in `f` terminates the worker
    /// thread (see the type-level docs).
    pub fn post<F>(&self, f: F) -> DispatchResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.assert_usable();

        if !self.worker.is_running() {
            return Err(DispatchError::WorkerGone);
        }

        let item = Arc::new(WorkItem::new(DispatchMode::Post, f));
        self.queue.enqueue(item)?;
        Ok(())
    }

    /// Stop the worker and reject all further dispatches
    ///
    /// Synchronous: returns once the worker thread has fully exited.
    /// Shutting down twice is a precondition violation.
    pub fn shutdown(&mut self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            panic!("Dispatcher already shut down");
        }
        self.worker.stop();
    }

    /// Check whether the calling thread is the worker thread
    pub fn is_worker_thread(&self) -> bool {
        self.worker.identity() == Some(thread::current().id())
    }

    /// Get the worker's published thread identity
    pub fn worker_thread_id(&self) -> Option<ThreadId> {
        self.worker.identity()
    }

    /// Check if the worker thread is still servicing requests
    pub fn is_running(&self) -> bool {
        !self.disposed.load(Ordering::Acquire) && self.worker.is_running()
    }

    /// Fatal precondition check: dispatch after shutdown is a programming
    /// error, not a recoverable condition
    fn assert_usable(&self) {
        assert!(
            !self.disposed.load(Ordering::Acquire),
            "dispatch on a Dispatcher that has been shut down"
        );
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            self.worker.stop();
        }
    }
}
