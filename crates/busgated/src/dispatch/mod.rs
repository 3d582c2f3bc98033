//! Single-consumer intake queue feeding the worker pool.
//!
//! Transports hand every inbound text message to [`Dispatcher::enqueue`].
//! Messages are decoded at the intake boundary: malformed requests are
//! answered (when they carry an id) or dropped right away, and only valid
//! requests are queued. One consumer thread drains the queue in FIFO order
//! and submits each task to the [`WorkerPool`](crate::pool::WorkerPool);
//! the task's [`ReplyCompletion`] turns the handler outcome into at most one
//! reply written through the [`ReplySink`].

mod completion;
mod dispatcher;
mod errors;
mod sink;

pub use completion::ReplyCompletion;
pub use dispatcher::{DispatchConfig, Dispatcher, QueuedTask};
pub use errors::{DispatchError, EnqueueError, ReplyError};
pub use sink::ReplySink;

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
