//! Serial dispatcher bound to one dedicated worker thread
//!
//! This module implements the single-owner execution context: a façade that
//! arbitrary threads submit work to, a worker that executes it strictly one
//! item at a time in submission order, and the work item tying the two
//! together.

#[allow(clippy::module_inception)]
mod dispatcher;
mod item;
mod worker;

pub use dispatcher::Dispatcher;
pub use item::{CompletionSignal, DispatchMode, WorkItem};
pub use worker::Worker;
