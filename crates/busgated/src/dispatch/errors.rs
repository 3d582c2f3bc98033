//! Error types for the dispatch loop.

use std::io;

use busgate_jsonrpc::{RequestId, RpcError};
use thiserror::Error;

use crate::pool::PoolError;

/// Reasons a valid request could not be queued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnqueueError {
    /// The intake queue is at capacity.
    #[error("intake queue is full")]
    QueueFull {
        /// Id of the refused request.
        id: Option<RequestId>,
    },
    /// The dispatcher has been stopped.
    #[error("dispatcher is stopped")]
    Stopped {
        /// Id of the refused request.
        id: Option<RequestId>,
    },
}

impl EnqueueError {
    /// Id of the refused request; `None` for notifications.
    #[must_use]
    pub const fn id(&self) -> Option<&RequestId> {
        match self {
            Self::QueueFull { id } | Self::Stopped { id } => id.as_ref(),
        }
    }

    /// Application error suitable for answering the refused request.
    #[must_use]
    pub fn to_rpc_error(&self) -> RpcError {
        match self {
            Self::QueueFull { .. } => RpcError::application("QueueFull intake queue is full"),
            Self::Stopped { .. } => RpcError::application("Stopped dispatcher is stopped"),
        }
    }
}

/// Failures reported by a [`ReplySink`](super::ReplySink).
#[derive(Debug, Error)]
pub enum ReplyError {
    /// The client is gone.
    #[error("reply target is disconnected")]
    Disconnected,
    /// Writing the reply failed.
    #[error("failed to write reply: {source}")]
    Io {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl ReplyError {
    /// Wraps an IO error.
    #[must_use]
    pub const fn io(source: io::Error) -> Self {
        Self::Io { source }
    }
}

/// Failures starting or resetting the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The consumer thread could not be created.
    #[error("failed to spawn dispatch consumer: {source}")]
    Spawn {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The worker pool could not be restarted.
    #[error("failed to reset workers: {source}")]
    Reset {
        /// Pool failure.
        #[source]
        source: PoolError,
    },
}
