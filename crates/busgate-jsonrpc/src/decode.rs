//! Inbound message classification.

use serde_json::{Map, Value};

use crate::envelope::{Envelope, Params, RequestId, RpcErrorResponse, RpcRequest, RpcResponse};
use crate::error::{DecodeError, RpcError};

const MEMBERS: [&str; 3] = ["method", "result", "error"];

/// Classifies `text` as a request, a result response or an error response.
///
/// Unknown members are dropped, including unknown members of an error
/// object. The returned request method is trimmed.
///
/// # Errors
///
/// Returns a [`DecodeError`] describing the first violation found. Every
/// variant except [`DecodeError::Parse`] carries the id when it could be
/// read.
pub fn decode(text: &str) -> Result<Envelope, DecodeError> {
    let value: Value = serde_json::from_str(text).map_err(|error| DecodeError::parse(&error))?;
    let Value::Object(mut object) = value else {
        return Err(DecodeError::invalid_request(None, "message is not an object"));
    };
    let id = read_id(object.remove("id"))?;

    let members = MEMBERS
        .iter()
        .filter(|member| object.contains_key(**member))
        .count();
    if members != 1 {
        return Err(DecodeError::AmbiguousEnvelope { id, members });
    }

    if let Some(method) = object.remove("method") {
        let request = read_request(id, method, object.remove("params"))?;
        return Ok(Envelope::Request(request));
    }
    if let Some(result) = object.remove("result") {
        return Ok(Envelope::Response(RpcResponse { id, result }));
    }
    let error = object.remove("error").unwrap_or(Value::Null);
    let error = read_error(id.as_ref(), error)?;
    Ok(Envelope::Error(RpcErrorResponse { id, error }))
}

fn read_id(value: Option<Value>) -> Result<Option<RequestId>, DecodeError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(RequestId::Str(text))),
        Some(Value::Number(number)) => Ok(Some(RequestId::Num(number))),
        Some(_) => Err(DecodeError::invalid_request(
            None,
            "id must be a string, a number or null",
        )),
    }
}

fn read_request(
    id: Option<RequestId>,
    method: Value,
    params: Option<Value>,
) -> Result<RpcRequest, DecodeError> {
    let Value::String(method) = method else {
        return Err(DecodeError::invalid_request(id, "method must be a string"));
    };
    let method = method.trim();
    if method.is_empty() {
        return Err(DecodeError::invalid_request(id, "method is empty"));
    }
    let params = match params {
        None | Some(Value::Null) => Params::default(),
        Some(Value::Array(values)) => Params::from_positional(values),
        Some(Value::Object(values)) => Params::from_named(values),
        Some(_) => return Err(DecodeError::InvalidParams { id }),
    };
    Ok(RpcRequest {
        id,
        method: method.to_owned(),
        params,
    })
}

fn read_error(id: Option<&RequestId>, error: Value) -> Result<RpcError, DecodeError> {
    let invalid = |reason| DecodeError::InvalidError {
        id: id.cloned(),
        reason,
    };
    let Value::Object(mut object) = error else {
        return Err(invalid("error must be an object"));
    };
    let code = object
        .get("code")
        .and_then(Value::as_i64)
        .ok_or_else(|| invalid("code must be an integer"))?;
    let message = match object.remove("message") {
        Some(Value::String(message)) if !message.is_empty() => message,
        _ => return Err(invalid("message must be a non-empty string")),
    };
    let data = take_data(&mut object);
    Ok(RpcError {
        code,
        message,
        data,
    })
}

fn take_data(object: &mut Map<String, Value>) -> Option<Value> {
    object.remove("data").filter(|data| !data.is_null())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn request(text: &str) -> RpcRequest {
        match decode(text) {
            Ok(Envelope::Request(request)) => request,
            other => panic!("expected a request, got {other:?}"),
        }
    }

    #[rstest]
    fn decodes_positional_request_with_trimmed_method() {
        let request = request(r#"{"jsonrpc":"2.0","id":1,"method":"  add ","params":[2,3]}"#);
        assert_eq!(request.id, Some(RequestId::from(1)));
        assert_eq!(request.method, "add");
        assert_eq!(request.params.positional_values(), &[json!(2), json!(3)]);
    }

    #[rstest]
    fn decodes_named_request_and_drops_unknown_members() {
        let request = request(r#"{"id":"a","method":"echo","params":{"txt":"x"},"extra":1}"#);
        assert_eq!(request.id, Some(RequestId::from("a")));
        assert_eq!(request.params.named_values().get("txt"), Some(&json!("x")));
    }

    #[rstest]
    #[case(r#"{"method":"echo"}"#)]
    #[case(r#"{"id":null,"method":"echo","params":null}"#)]
    fn missing_or_null_id_is_a_notification(#[case] text: &str) {
        let request = request(text);
        assert!(request.is_notification());
        assert_eq!(request.params, Params::default());
    }

    #[rstest]
    fn decodes_result_response() {
        let envelope = decode(r#"{"jsonrpc":"2.0","id":4,"result":null}"#).expect("response");
        assert_eq!(
            envelope,
            Envelope::Response(RpcResponse {
                id: Some(RequestId::from(4)),
                result: Value::Null,
            })
        );
    }

    #[rstest]
    fn decodes_error_response_dropping_unknown_error_members() {
        let envelope =
            decode(r#"{"id":4,"error":{"code":-1,"message":"boom","data":[1],"x":true}}"#)
                .expect("error response");
        let Envelope::Error(response) = envelope else {
            panic!("expected an error response");
        };
        assert_eq!(response.error.code, -1);
        assert_eq!(response.error.message, "boom");
        assert_eq!(response.error.data, Some(json!([1])));
    }

    #[rstest]
    #[case("not json", RpcError::PARSE_ERROR, None)]
    #[case("[1,2]", RpcError::INVALID_REQUEST, None)]
    #[case(r#"{"id":true,"method":"a"}"#, RpcError::INVALID_REQUEST, None)]
    #[case(r#"{"id":5}"#, RpcError::PARSE_ERROR, Some(RequestId::from(5)))]
    #[case(r#"{"id":5,"method":"a","result":1}"#, RpcError::PARSE_ERROR, Some(RequestId::from(5)))]
    #[case(r#"{"id":6,"method":"   "}"#, RpcError::INVALID_REQUEST, Some(RequestId::from(6)))]
    #[case(r#"{"id":6,"method":12}"#, RpcError::INVALID_REQUEST, Some(RequestId::from(6)))]
    #[case(
        r#"{"id":7,"method":"a","params":"x"}"#,
        RpcError::INVALID_PARAMS,
        Some(RequestId::from(7))
    )]
    #[case(
        r#"{"id":8,"error":{"code":"x","message":"m"}}"#,
        RpcError::INVALID_REQUEST,
        Some(RequestId::from(8))
    )]
    #[case(
        r#"{"id":8,"error":{"code":1,"message":""}}"#,
        RpcError::INVALID_REQUEST,
        Some(RequestId::from(8))
    )]
    #[case(r#"{"id":"s","error":"boom"}"#, RpcError::INVALID_REQUEST, Some(RequestId::from("s")))]
    fn maps_failures_to_codes_and_recovered_ids(
        #[case] text: &str,
        #[case] code: i64,
        #[case] id: Option<RequestId>,
    ) {
        let error = decode(text).expect_err("malformed input");
        assert_eq!(error.to_rpc_error().code, code);
        assert_eq!(error.recovered_id(), id.as_ref());
    }
}
