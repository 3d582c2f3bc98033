//! Per-connection line handling.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;

use busgate_jsonrpc::encode_error;
use tracing::{debug, info, warn};

use super::TRANSPORT_TARGET;
use super::sink::{ConnectionSink, ReplyTarget};
use crate::dispatch::{Dispatcher, ReplySink};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// Longest accepted line, newline included.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Stream types accepted by the listener.
#[derive(Debug)]
pub enum ConnectionStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl ConnectionStream {
    /// Second handle to the same socket, used as the reply writer.
    pub fn try_clone(&self) -> io::Result<Self> {
        match self {
            Self::Tcp(stream) => stream.try_clone().map(Self::Tcp),
            #[cfg(unix)]
            Self::Unix(stream) => stream.try_clone().map(Self::Unix),
        }
    }

    /// Shuts down both directions of the socket.
    pub fn shutdown(&self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            Self::Unix(stream) => stream.shutdown(Shutdown::Both),
        }
    }
}

impl Read for ConnectionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ConnectionStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

/// Handles accepted socket connections.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Serves one connection until it closes. `connection` numbers the
    /// connections accepted by a listener.
    fn handle(&self, connection: u64, stream: ConnectionStream);
}

/// Feeds every line of a connection to a [`Dispatcher`].
pub struct LineConnectionHandler {
    dispatcher: Arc<Dispatcher<ConnectionSink>>,
    sink: Arc<ConnectionSink>,
}

impl LineConnectionHandler {
    /// Handler enqueueing on `dispatcher`; `sink` must be the dispatcher's
    /// sink and is used to refuse requests the dispatcher cannot take.
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher<ConnectionSink>>, sink: Arc<ConnectionSink>) -> Self {
        Self { dispatcher, sink }
    }

    fn serve(&self, target: &ReplyTarget, reader: &mut impl BufRead) -> io::Result<()> {
        let mut line = Vec::new();
        loop {
            line.clear();
            if !read_line(reader, &mut line)? {
                return Ok(());
            }
            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            self.submit(target, text);
        }
    }

    fn submit(&self, target: &ReplyTarget, text: &str) {
        let Err(error) = self.dispatcher.enqueue(target.clone(), text) else {
            return;
        };
        warn!(
            target: TRANSPORT_TARGET,
            connection = target.connection(),
            error = %error,
            "request refused"
        );
        if let Some(id) = error.id() {
            let reply = encode_error(Some(id), &error.to_rpc_error());
            if let Err(send_error) = self.sink.send(target, &reply) {
                warn!(
                    target: TRANSPORT_TARGET,
                    connection = target.connection(),
                    error = %send_error,
                    "failed to send refusal"
                );
            }
        }
    }
}

impl ConnectionHandler for LineConnectionHandler {
    fn handle(&self, connection: u64, stream: ConnectionStream) {
        let writer = match stream.try_clone() {
            Ok(writer) => writer,
            Err(error) => {
                warn!(
                    target: TRANSPORT_TARGET,
                    connection,
                    error = %error,
                    "failed to clone connection stream"
                );
                return;
            }
        };
        let target = ReplyTarget::new(connection, writer);
        info!(target: TRANSPORT_TARGET, connection, "client connected");
        let mut reader = BufReader::new(stream);
        match self.serve(&target, &mut reader) {
            Ok(()) => info!(target: TRANSPORT_TARGET, connection, "client disconnected"),
            Err(error) => {
                warn!(
                    target: TRANSPORT_TARGET,
                    connection,
                    error = %error,
                    "closing connection"
                );
                if let Err(error) = reader.get_ref().shutdown() {
                    debug!(target: TRANSPORT_TARGET, connection, error = %error, "shutdown failed");
                }
            }
        }
    }
}

/// Reads one line into `line`, without its terminator. Returns `false` at
/// end of stream with nothing buffered.
fn read_line(reader: &mut impl BufRead, line: &mut Vec<u8>) -> io::Result<bool> {
    let limit = u64::try_from(MAX_LINE_BYTES).unwrap_or(u64::MAX);
    let read = read_until_retrying(&mut reader.take(limit), line)?;
    if read == 0 {
        return Ok(false);
    }
    if line.last() == Some(&b'\n') {
        line.pop();
    } else if line.len() >= MAX_LINE_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "line exceeds maximum size",
        ));
    }
    Ok(true)
}

fn read_until_retrying(reader: &mut impl BufRead, line: &mut Vec<u8>) -> io::Result<usize> {
    loop {
        match reader.read_until(b'\n', line) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}
