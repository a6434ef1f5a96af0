//! Single-owner execution context
//!
//! This crate provides a dispatcher bound to one dedicated worker thread:
//! - Work submitted from any thread runs on that one thread, one item at a
//!   time, in submission order
//! - Blocking dispatch ([`Dispatcher::send`]) with optional timeout and
//!   best-effort withdrawal
//! - Fire-and-forget dispatch ([`Dispatcher::post`])
//! - Panic transport: a panic inside a sent closure is re-raised on the
//!   submitting thread, never on the worker
//!
//! Historically this pattern exists to satisfy apartment-affine APIs that
//! must always be called from the same thread; the dispatcher guarantees
//! that affinity without the caller managing the thread itself.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod dispatcher;
pub mod queue;

pub use dispatcher::{DispatchMode, Dispatcher, WorkItem, Worker};
pub use queue::{HandoffQueue, QueueError};

/// Dispatch errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The worker thread is no longer running (killed by a panicking
    /// fire-and-forget item)
    #[error("Worker thread is no longer servicing requests")]
    WorkerGone,

    /// The handoff queue rejected the item
    #[error("Handoff queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Dispatch result
pub type DispatchResult<T> = Result<T, DispatchError>;
