//! Wire error objects and codec failures.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::envelope::RequestId;

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} (code {code})")]
pub struct RpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable description, never empty.
    pub message: String,
    /// Optional structured detail.
    pub data: Option<Value>,
}

impl RpcError {
    /// Text was not valid JSON, or the envelope shape was ambiguous.
    pub const PARSE_ERROR: i64 = -32700;
    /// The message is not a valid request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// The method path does not resolve.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Arguments do not fit the method.
    pub const INVALID_PARAMS: i64 = -32602;
    /// The handler failed.
    pub const APPLICATION_ERROR: i64 = -32500;

    const UNKNOWN_MESSAGE: &'static str = "Unknown application error.";

    /// Builds an error, substituting a generic message for an empty one.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            code,
            message: if message.is_empty() {
                Self::UNKNOWN_MESSAGE.to_owned()
            } else {
                message
            },
            data: None,
        }
    }

    /// Attaches structured detail.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// `-32700`.
    #[must_use]
    pub fn parse_error() -> Self {
        Self::new(Self::PARSE_ERROR, "Parse error.")
    }

    /// `-32600`.
    #[must_use]
    pub fn invalid_request() -> Self {
        Self::new(Self::INVALID_REQUEST, "The JSON sent is not a valid Request object.")
    }

    /// `-32601`.
    #[must_use]
    pub fn method_not_found() -> Self {
        Self::new(
            Self::METHOD_NOT_FOUND,
            "The method does not exist / is not available.",
        )
    }

    /// `-32602`.
    #[must_use]
    pub fn invalid_params() -> Self {
        Self::new(Self::INVALID_PARAMS, "Invalid method parameter(s).")
    }

    /// `-32602` with the reason attached as `data`.
    #[must_use]
    pub fn invalid_params_because(reason: impl Into<String>) -> Self {
        Self::invalid_params().with_data(Value::String(reason.into()))
    }

    /// `-32500` with a caller-supplied message.
    #[must_use]
    pub fn application(message: impl Into<String>) -> Self {
        Self::new(Self::APPLICATION_ERROR, message)
    }

    /// Wire representation. `data` is always present, `null` when unset.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("code".to_owned(), Value::from(self.code));
        object.insert("message".to_owned(), Value::String(self.message.clone()));
        object.insert(
            "data".to_owned(),
            self.data.clone().unwrap_or(Value::Null),
        );
        Value::Object(object)
    }
}

/// Reasons an inbound text could not be classified.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// The text is not JSON.
    #[error("invalid JSON received: {detail}")]
    Parse {
        /// Parser diagnostic.
        detail: String,
    },
    /// Zero or several of `method`, `result` and `error` were present.
    #[error("expected exactly one of method, result or error, found {members}")]
    AmbiguousEnvelope {
        /// Id recovered before the shape check.
        id: Option<RequestId>,
        /// How many of the three members were present.
        members: usize,
    },
    /// The message is not a valid request object.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// Id, when it was readable.
        id: Option<RequestId>,
        /// What was wrong.
        reason: &'static str,
    },
    /// `params` is neither an array nor an object.
    #[error("params must be an array or an object")]
    InvalidParams {
        /// Id of the offending request.
        id: Option<RequestId>,
    },
    /// An error response carries a malformed error object.
    #[error("invalid error object: {reason}")]
    InvalidError {
        /// Id of the offending response.
        id: Option<RequestId>,
        /// What was wrong.
        reason: &'static str,
    },
}

impl DecodeError {
    pub(crate) fn parse(error: &serde_json::Error) -> Self {
        Self::Parse {
            detail: error.to_string(),
        }
    }

    pub(crate) const fn invalid_request(id: Option<RequestId>, reason: &'static str) -> Self {
        Self::InvalidRequest { id, reason }
    }

    /// Request id extracted before the failure, if any.
    #[must_use]
    pub const fn recovered_id(&self) -> Option<&RequestId> {
        match self {
            Self::Parse { .. } => None,
            Self::AmbiguousEnvelope { id, .. }
            | Self::InvalidRequest { id, .. }
            | Self::InvalidParams { id }
            | Self::InvalidError { id, .. } => id.as_ref(),
        }
    }

    /// Wire error object describing this failure.
    #[must_use]
    pub fn to_rpc_error(&self) -> RpcError {
        match self {
            Self::Parse { detail } => {
                RpcError::parse_error().with_data(Value::String(detail.clone()))
            }
            Self::AmbiguousEnvelope { .. } => RpcError::new(
                RpcError::PARSE_ERROR,
                "Exactly one of method, result and error must be present.",
            ),
            Self::InvalidRequest { reason, .. } => {
                RpcError::invalid_request().with_data(Value::String((*reason).to_owned()))
            }
            Self::InvalidParams { .. } => RpcError::invalid_params(),
            Self::InvalidError { reason, .. } => RpcError::new(
                RpcError::INVALID_REQUEST,
                "The JSON sent is not a valid Error object.",
            )
            .with_data(Value::String((*reason).to_owned())),
        }
    }
}

/// A handler value with no JSON representation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("values of type {type_name} cannot be represented as JSON")]
pub struct UnsupportedTypeError {
    /// Name of the offending value kind.
    pub type_name: &'static str,
}
