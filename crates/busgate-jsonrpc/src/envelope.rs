//! Decoded message shapes.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

use crate::error::RpcError;

/// Request identifier as sent by the caller. An absent or `null` id is
/// represented as `None` at the use sites and marks a notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestId {
    /// String id.
    Str(String),
    /// Numeric id, integer or float, kept exactly as received.
    Num(Number),
}

impl From<&RequestId> for Value {
    fn from(id: &RequestId) -> Self {
        match id {
            RequestId::Str(text) => Self::String(text.clone()),
            RequestId::Num(number) => Self::Number(number.clone()),
        }
    }
}

impl From<&str> for RequestId {
    fn from(text: &str) -> Self {
        Self::Str(text.to_owned())
    }
}

impl From<i64> for RequestId {
    fn from(number: i64) -> Self {
        Self::Num(number.into())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(text) => write!(formatter, "{text:?}"),
            Self::Num(number) => write!(formatter, "{number}"),
        }
    }
}

/// Method arguments. JSON-RPC allows either a positional array or a named
/// object; an absent `params` member yields empty arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    positional: Vec<Value>,
    named: Map<String, Value>,
}

impl Params {
    /// Positional arguments.
    #[must_use]
    pub fn from_positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            named: Map::new(),
        }
    }

    /// Named arguments.
    #[must_use]
    pub fn from_named(values: Map<String, Value>) -> Self {
        Self {
            positional: Vec::new(),
            named: values,
        }
    }

    /// Raw positional arguments.
    #[must_use]
    pub fn positional_values(&self) -> &[Value] {
        &self.positional
    }

    /// Raw named arguments.
    #[must_use]
    pub fn named_values(&self) -> &Map<String, Value> {
        &self.named
    }

    /// Total number of arguments supplied.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    /// Fails with an invalid-params error unless exactly `expected`
    /// arguments were supplied.
    pub fn expect_arity(&self, expected: usize) -> Result<(), RpcError> {
        let actual = self.arity();
        if actual == expected {
            Ok(())
        } else {
            Err(RpcError::invalid_params_because(format!(
                "expected {expected} argument(s), got {actual}"
            )))
        }
    }

    /// Positional argument at `index`, converted to `T`.
    pub fn positional<T: DeserializeOwned>(&self, index: usize) -> Result<T, RpcError> {
        let value = self.positional.get(index).ok_or_else(|| {
            RpcError::invalid_params_because(format!("missing positional argument {index}"))
        })?;
        convert(value, || format!("positional argument {index}"))
    }

    /// Named argument `name`, converted to `T`.
    pub fn named<T: DeserializeOwned>(&self, name: &str) -> Result<T, RpcError> {
        let value = self.named.get(name).ok_or_else(|| {
            RpcError::invalid_params_because(format!("missing argument '{name}'"))
        })?;
        convert(value, || format!("argument '{name}'"))
    }

    /// Argument given either at position `index` or by `name`.
    pub fn argument<T: DeserializeOwned>(&self, index: usize, name: &str) -> Result<T, RpcError> {
        if self.positional.len() > index {
            self.positional(index)
        } else {
            self.named(name)
        }
    }

    /// Every positional argument converted to `T`. Named arguments are
    /// rejected.
    pub fn variadic<T: DeserializeOwned>(&self) -> Result<Vec<T>, RpcError> {
        if let Some(name) = self.named.keys().next() {
            return Err(RpcError::invalid_params_because(format!(
                "unexpected named argument '{name}'"
            )));
        }
        self.positional
            .iter()
            .enumerate()
            .map(|(index, value)| convert(value, || format!("positional argument {index}")))
            .collect()
    }
}

fn convert<T: DeserializeOwned>(
    value: &Value,
    describe: impl FnOnce() -> String,
) -> Result<T, RpcError> {
    serde_json::from_value(value.clone()).map_err(|error| {
        RpcError::invalid_params_because(format!("{} has the wrong type: {error}", describe()))
    })
}

/// A method call. `id == None` makes it a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    /// Caller-chosen id, absent for notifications.
    pub id: Option<RequestId>,
    /// Dotted method path, trimmed of surrounding whitespace.
    pub method: String,
    /// Call arguments.
    pub params: Params,
}

impl RpcRequest {
    /// Whether the caller expects no reply.
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// A successful reply received from a peer.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    /// Id of the request being answered.
    pub id: Option<RequestId>,
    /// Result payload.
    pub result: Value,
}

/// An error reply received from a peer.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcErrorResponse {
    /// Id of the request being answered.
    pub id: Option<RequestId>,
    /// Error payload.
    pub error: RpcError,
}

/// The three mutually exclusive message shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Carries `method`.
    Request(RpcRequest),
    /// Carries `result`.
    Response(RpcResponse),
    /// Carries `error`.
    Error(RpcErrorResponse),
}

impl Envelope {
    /// Id carried by the envelope, if any.
    #[must_use]
    pub const fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(request) => request.id.as_ref(),
            Self::Response(response) => response.id.as_ref(),
            Self::Error(error) => error.id.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn positional(value: Value) -> Params {
        match value {
            Value::Array(values) => Params::from_positional(values),
            other => panic!("expected an array, got {other}"),
        }
    }

    #[rstest]
    fn extracts_typed_positional_arguments() {
        let params = positional(json!([2, "three"]));
        assert_eq!(params.positional::<i64>(0).ok(), Some(2));
        assert_eq!(params.positional::<String>(1).ok().as_deref(), Some("three"));
    }

    #[rstest]
    fn type_mismatch_is_invalid_params() {
        let params = positional(json!(["two"]));
        let error = params.positional::<i64>(0).expect_err("string is not an integer");
        assert_eq!(error.code, RpcError::INVALID_PARAMS);
    }

    #[rstest]
    fn argument_falls_back_to_named_lookup() {
        let mut named = Map::new();
        named.insert("txt".to_owned(), json!("hi"));
        let params = Params::from_named(named);
        assert_eq!(params.argument::<String>(0, "txt").ok().as_deref(), Some("hi"));
        assert!(params.argument::<String>(0, "other").is_err());
    }

    #[rstest]
    #[case(json!([1, 2]), 2, true)]
    #[case(json!([1]), 2, false)]
    #[case(json!([1, 2, 3]), 2, false)]
    fn checks_arity(#[case] args: Value, #[case] expected: usize, #[case] ok: bool) {
        assert_eq!(positional(args).expect_arity(expected).is_ok(), ok);
    }

    #[rstest]
    fn variadic_rejects_named_arguments() {
        let mut named = Map::new();
        named.insert("a".to_owned(), json!(1));
        assert!(Params::from_named(named).variadic::<i64>().is_err());
        assert_eq!(
            positional(json!([1, 2, 3])).variadic::<i64>().ok(),
            Some(vec![1, 2, 3])
        );
    }

    #[rstest]
    fn request_id_displays_like_json() {
        assert_eq!(RequestId::from("abc").to_string(), "\"abc\"");
        assert_eq!(RequestId::from(7).to_string(), "7");
    }
}
