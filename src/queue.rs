//! Blocking handoff queue carrying work items from submitters to the worker

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

/// Errors that can occur when using a [`HandoffQueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// Enqueue attempted after the queue was closed
    #[error("Queue is closed")]
    Closed,
}

/// Queue state guarded by the mutex
struct Inner<T> {
    /// Pending items in FIFO order
    items: VecDeque<T>,

    /// Set by `release_reader`; a blocked dequeue returns `None` once set
    released: bool,

    /// Set by `close`; further enqueues fail
    closed: bool,
}

/// Thread-safe blocking FIFO
///
/// Submitter threads `enqueue` without blocking; the single consumer blocks
/// in `dequeue` until work arrives or the reader is released. The queue is
/// the only shared mutable structure between submitters and the worker.
pub struct HandoffQueue<T> {
    /// Items plus release/close flags
    inner: Mutex<Inner<T>>,

    /// Signaled on enqueue and on reader release
    ready: Condvar,
}

impl<T> HandoffQueue<T> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                released: false,
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Append an item and wake one blocked dequeuer
    ///
    /// Never blocks the enqueuer. Fails only after [`close`](Self::close).
    pub fn enqueue(&self, item: T) -> Result<(), QueueError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(QueueError::Closed);
        }
        inner.items.push_back(item);
        self.ready.notify_one();
        Ok(())
    }

    /// Block until an item is available or the reader is released
    ///
    /// Returns `None` only when the queue was released while empty, which is
    /// how the consumer distinguishes "stop requested" from "got work".
    pub fn dequeue(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(item) = inner.items.pop_front() {
                return Some(item);
            }
            if inner.released {
                return None;
            }
            self.ready.wait(&mut inner);
        }
    }

    /// Wake any blocked dequeuer, making it return `None`
    ///
    /// Idempotent; the release flag stays set.
    pub fn release_reader(&self) {
        let mut inner = self.inner.lock();
        inner.released = true;
        self.ready.notify_all();
    }

    /// Reject all further enqueues
    ///
    /// Called once the consumer thread has exited. Synchronization resources
    /// themselves are reclaimed by `Drop`.
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }

    /// Number of pending items
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Check if no items are pending
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }
}

impl<U> HandoffQueue<Arc<U>> {
    /// Best-effort removal of a specific not-yet-dequeued item
    ///
    /// Identity is pointer identity of the `Arc`. Returns `false` (no-op)
    /// when the item is not present, i.e. already dequeued or already
    /// removed.
    pub fn remove(&self, item: &Arc<U>) -> bool {
        let mut inner = self.inner.lock();
        match inner.items.iter().position(|i| Arc::ptr_eq(i, item)) {
            Some(index) => {
                inner.items.remove(index);
                true
            }
            None => false,
        }
    }
}

impl<T> Default for HandoffQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
