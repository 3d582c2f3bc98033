//! Reply path back to line transport clients.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use super::handler::ConnectionStream;
use crate::dispatch::{ReplyError, ReplySink};
use crate::sync::lock;

/// Writer half of one client connection.
#[derive(Clone)]
pub struct ReplyTarget {
    connection: u64,
    writer: Arc<Mutex<ConnectionStream>>,
}

impl ReplyTarget {
    /// Target writing to `writer` on behalf of `connection`.
    #[must_use]
    pub fn new(connection: u64, writer: ConnectionStream) -> Self {
        Self {
            connection,
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Listener-assigned connection number.
    #[must_use]
    pub const fn connection(&self) -> u64 {
        self.connection
    }
}

impl fmt::Debug for ReplyTarget {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ReplyTarget")
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

/// Writes each reply as one line on the originating connection.
///
/// Replies from different workers to the same connection are serialised by
/// the connection's writer lock, so lines never interleave.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConnectionSink;

impl ReplySink for ConnectionSink {
    type Target = ReplyTarget;

    fn send(&self, target: &ReplyTarget, text: &str) -> Result<(), ReplyError> {
        let mut writer = lock(&target.writer);
        write_line(&mut *writer, text).map_err(|error| match error.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected => ReplyError::Disconnected,
            _ => ReplyError::io(error),
        })
    }
}

fn write_line(writer: &mut impl Write, text: &str) -> io::Result<()> {
    writer.write_all(text.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}
