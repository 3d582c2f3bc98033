use busgate_jsonrpc::{NativeValue, Params, RpcError};
use thiserror::Error;

/// A callable method.
///
/// Handlers run on worker threads and may be invoked concurrently.
pub trait Handler: Send + Sync {
    /// Runs the method with the decoded arguments.
    fn call(&self, params: Params) -> Result<NativeValue, HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(Params) -> Result<NativeValue, HandlerError> + Send + Sync,
{
    fn call(&self, params: Params) -> Result<NativeValue, HandlerError> {
        self(params)
    }
}

/// Failure raised while resolving or running a handler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandlerError {
    /// A protocol-level error, forwarded to the caller unchanged.
    #[error(transparent)]
    Rpc(#[from] RpcError),
    /// Any other failure. Reported as an application error whose message is
    /// `"<kind> <message>"`.
    #[error("{kind} {message}")]
    Failure {
        /// Short classification, e.g. `TypeError`.
        kind: String,
        /// Details.
        message: String,
    },
}

impl HandlerError {
    /// Builds a [`HandlerError::Failure`].
    #[must_use]
    pub fn failure(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failure {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Wire error object for this failure.
    #[must_use]
    pub fn to_rpc_error(&self) -> RpcError {
        match self {
            Self::Rpc(error) => error.clone(),
            Self::Failure { .. } => RpcError::application(self.to_string()),
        }
    }
}
