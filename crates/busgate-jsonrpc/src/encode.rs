//! Outbound reply serialisation.

use serde_json::{Map, Value};

use crate::envelope::RequestId;
use crate::error::RpcError;
use crate::value::{ByteEncoding, NativeValue};

/// Protocol version stamped on every outbound message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Serialises a result reply.
///
/// Values without a JSON form are written as their textual representation;
/// encoding never fails.
#[must_use]
pub fn encode_result(id: Option<&RequestId>, result: &NativeValue) -> String {
    frame(id, "result", result.normalise_lossy(ByteEncoding::Utf8))
}

/// Serialises an error reply. The error object always carries `data`.
#[must_use]
pub fn encode_error(id: Option<&RequestId>, error: &RpcError) -> String {
    frame(id, "error", error.to_value())
}

fn frame(id: Option<&RequestId>, member: &str, payload: Value) -> String {
    let mut object = Map::new();
    object.insert("jsonrpc".to_owned(), Value::from(JSONRPC_VERSION));
    object.insert("id".to_owned(), id.map_or(Value::Null, Value::from));
    object.insert(member.to_owned(), payload);
    Value::Object(object).to_string()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::decode::decode;
    use crate::envelope::Envelope;

    fn parse(text: &str) -> Value {
        serde_json::from_str(text).expect("encoder output is JSON")
    }

    #[rstest]
    fn result_reply_carries_version_and_id() {
        let text = encode_result(Some(&RequestId::from(1)), &NativeValue::Int(5));
        assert_eq!(parse(&text), json!({"jsonrpc": "2.0", "id": 1, "result": 5}));
    }

    #[rstest]
    fn error_reply_serialises_null_data() {
        let text = encode_error(Some(&RequestId::from("x")), &RpcError::method_not_found());
        let value = parse(&text);
        assert_eq!(value["jsonrpc"], json!("2.0"));
        assert_eq!(value["id"], json!("x"));
        assert_eq!(value["error"]["code"], json!(-32601));
        assert_eq!(value["error"]["data"], Value::Null);
    }

    #[rstest]
    fn missing_id_is_written_as_null() {
        let text = encode_error(None, &RpcError::parse_error());
        assert_eq!(parse(&text)["id"], Value::Null);
    }

    #[rstest]
    fn unsupported_results_fall_back_to_text() {
        let text = encode_result(
            Some(&RequestId::from(2)),
            &NativeValue::Duration(Duration::from_secs(61)),
        );
        assert_eq!(parse(&text)["result"], json!("0:01:01"));
    }

    #[rstest]
    fn encoded_error_decodes_as_error_envelope() {
        let error = RpcError::application("Exception boom");
        let text = encode_error(Some(&RequestId::from(9)), &error);
        match decode(&text) {
            Ok(Envelope::Error(response)) => assert_eq!(response.error, error),
            other => panic!("expected an error envelope, got {other:?}"),
        }
    }
}
