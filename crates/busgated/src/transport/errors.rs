//! Failures binding or running the gateway listener.

use std::io;

use thiserror::Error;

/// Errors surfaced while binding or running the gateway listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The configured TCP host did not resolve to an address.
    #[error("cannot resolve gateway address {endpoint}: {source}")]
    Unresolvable {
        /// Host and port as configured.
        endpoint: String,
        /// Resolver failure.
        #[source]
        source: io::Error,
    },
    /// The socket could not be bound.
    #[error("cannot bind gateway endpoint {endpoint}: {source}")]
    Bind {
        /// Resolved address or socket path.
        endpoint: String,
        /// OS error.
        #[source]
        source: io::Error,
    },
    /// The listener could not be switched to non-blocking accepts.
    #[error("cannot poll gateway listener: {source}")]
    Poll {
        /// OS error.
        #[source]
        source: io::Error,
    },
    /// The accept thread could not be created.
    #[error("cannot spawn accept thread: {source}")]
    Spawn {
        /// OS error.
        #[source]
        source: io::Error,
    },
    /// Unix endpoints need platform support this build lacks.
    #[cfg(not(unix))]
    #[error("gateway endpoint {endpoint} needs unix socket support")]
    UnixUnsupported {
        /// Endpoint as configured.
        endpoint: String,
    },
    /// Another daemon still answers on the socket path.
    #[cfg(unix)]
    #[error("gateway socket {path} is held by a running daemon")]
    SocketHeld {
        /// Socket path.
        path: String,
    },
    /// Something other than a socket occupies the socket path.
    #[cfg(unix)]
    #[error("gateway socket path {path} is occupied by a non-socket file")]
    NotASocket {
        /// Socket path.
        path: String,
    },
    /// A socket file left behind could not be inspected or removed.
    #[cfg(unix)]
    #[error("cannot {step} leftover gateway socket {path}: {source}")]
    Leftover {
        /// What was being attempted: `inspect`, `probe` or `remove`.
        step: &'static str,
        /// Socket path.
        path: String,
        /// OS error.
        #[source]
        source: io::Error,
    },
    /// The accept thread panicked.
    #[error("accept thread panicked")]
    AcceptPanicked,
}
