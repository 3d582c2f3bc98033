use std::time::Duration;

use thiserror::Error;

use super::registry::CorrelationKey;

/// Failures of the correlation registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// An invocation with the same key is already waiting.
    #[error("an invocation is already pending for '{key}'")]
    DuplicateKey {
        /// The contested key.
        key: CorrelationKey,
    },
}

/// Reasons a flow invocation did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    /// No live peer matches the requested server and process.
    #[error("no live peer for server {server:?} process {process:?}")]
    NoPeer {
        /// Requested server, if any.
        server: Option<String>,
        /// Requested process, if any.
        process: Option<String>,
    },
    /// Explicit target selection is configured but the target is partial.
    #[error("both server and process must be given")]
    IncompleteTarget,
    /// The bus refused to issue the flow.
    #[error("failed to issue flow: {message}")]
    Bus {
        /// Bus-provided details.
        message: String,
    },
    /// The remote peer acknowledged with a failure code.
    #[error("flow rejected with ack {ack}: {message}")]
    Rejected {
        /// Acknowledgment code, anything other than `1`.
        ack: i64,
        /// Peer-provided message.
        message: String,
    },
    /// No acknowledgment arrived in time.
    #[error("no acknowledgment for '{key}' within {after:?}")]
    Timeout {
        /// Key of the abandoned invocation.
        key: CorrelationKey,
        /// The configured wait budget.
        after: Duration,
    },
    /// The pending invocation was cancelled.
    #[error("invocation '{key}' was cancelled")]
    Cancelled {
        /// Key of the cancelled invocation.
        key: CorrelationKey,
    },
    /// The invocation could not be registered.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl FlowError {
    /// Builds a [`FlowError::Bus`].
    #[must_use]
    pub fn bus(message: impl Into<String>) -> Self {
        Self::Bus {
            message: message.into(),
        }
    }
}
