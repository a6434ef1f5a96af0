//! Worker thread that executes work items serially

use crate::dispatcher::WorkItem;
use crate::queue::HandoffQueue;
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Clears the liveness flag when the run loop exits for any reason,
/// including a `Post` panic unwinding the thread
struct LivenessGuard {
    alive: Arc<AtomicBool>,
}

impl Drop for LivenessGuard {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
    }
}

/// Worker owning the one dedicated thread all items execute on
///
/// The worker pulls items off the handoff queue and executes them strictly
/// in dequeue order. Its thread identity is published once, on first run,
/// and read by submitters for re-entrancy detection.
pub struct Worker {
    /// Queue the worker consumes from
    queue: Arc<HandoffQueue<Arc<WorkItem>>>,

    /// Thread identity, published by the run loop before the first dequeue
    identity: Arc<OnceCell<ThreadId>>,

    /// Shutdown signal, checked once per loop iteration
    shutdown: Arc<AtomicBool>,

    /// Cleared when the run loop exits, including by an escaped panic
    alive: Arc<AtomicBool>,

    /// Worker thread handle
    handle: Option<thread::JoinHandle<()>>,

    /// Name given to the worker thread
    thread_name: String,
}

impl Worker {
    /// Create a new Worker bound to `queue`
    pub fn new(queue: Arc<HandoffQueue<Arc<WorkItem>>>, thread_name: impl Into<String>) -> Self {
        Self {
            queue,
            identity: Arc::new(OnceCell::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
            alive: Arc::new(AtomicBool::new(false)),
            handle: None,
            thread_name: thread_name.into(),
        }
    }

    /// Start the worker thread
    pub fn start(&mut self) {
        let queue = self.queue.clone();
        let identity = self.identity.clone();
        let shutdown = self.shutdown.clone();
        let alive = self.alive.clone();

        alive.store(true, Ordering::Release);

        let handle = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || {
                let _guard = LivenessGuard { alive };
                let _ = identity.set(thread::current().id());
                Worker::run_loop(queue, shutdown);
            })
            .expect("Failed to spawn worker thread");

        self.handle = Some(handle);
    }

    /// Worker thread main loop
    fn run_loop(queue: Arc<HandoffQueue<Arc<WorkItem>>>, shutdown: Arc<AtomicBool>) {
        loop {
            // Check for shutdown signal
            if shutdown.load(Ordering::Acquire) {
                break;
            }

            // Blocking dequeue; `None` means the reader was released, so the
            // loop comes back around to observe the shutdown flag
            match queue.dequeue() {
                Some(item) => item.execute(),
                None => continue,
            }
        }

        #[cfg(debug_assertions)]
        eprintln!("Worker {:?} shutting down", thread::current().id());
    }

    /// Stop the worker thread
    ///
    /// Sets the shutdown flag, releases the blocked dequeuer, joins the
    /// thread, then closes the queue. Synchronous: does not return until the
    /// worker thread has fully exited. Expected to be called at most once.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.queue.release_reader();

        if let Some(handle) = self.handle.take() {
            // Joining a worker killed by a Post panic yields the panic
            // payload; the thread is gone either way
            let _ = handle.join();
        }

        self.queue.close();
    }

    /// Get the published thread identity, if the run loop has started
    pub fn identity(&self) -> Option<ThreadId> {
        self.identity.get().copied()
    }

    /// Check if the worker thread is still servicing the queue
    pub fn is_running(&self) -> bool {
        self.handle.is_some() && self.alive.load(Ordering::Acquire)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}
