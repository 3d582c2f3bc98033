//! JSONL socket transport standing in for a bus client connection.
//!
//! Every accepted connection behaves like one bus client: each
//! newline-terminated line is an inbound message for the [`Dispatcher`], and
//! replies are written back to the same connection one per line.
//!
//! [`Dispatcher`]: crate::dispatch::Dispatcher

mod errors;
mod handler;
mod listener;
#[cfg(test)]
mod listener_tests;
mod sink;

pub use self::errors::ListenerError;
pub use self::handler::{ConnectionHandler, ConnectionStream, LineConnectionHandler, MAX_LINE_BYTES};
pub use self::listener::{ListenerHandle, SocketListener};
pub use self::sink::{ConnectionSink, ReplyTarget};

const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
